use crate::features::auth::model::{AuthenticatedUser, Role};

use axum::{extract::Request, middleware::Next, response::Response, Router};

pub fn citizen(user_id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user_id.to_string(),
        role: Role::Citizen,
        department: None,
    }
}

pub fn staff(user_id: &str, department: Option<&str>) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user_id.to_string(),
        role: Role::Staff,
        department: department.map(String::from),
    }
}

pub fn admin(user_id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user_id.to_string(),
        role: Role::Admin,
        department: None,
    }
}

/// Stand-in for the bearer auth middleware: every request runs as `user`
pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                let response: Response = next.run(request).await;
                response
            }
        },
    ))
}
