use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::domain::{Role, User};
use crate::error::Result;
use crate::service::Service;
use crate::token::TokenPair;

use super::guard::CallerIdentity;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        refresh,
        list_users,
        find_user,
        set_role,
        set_password,
        set_email,
        set_user_name,
        remove_user,
    ]
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: UserView,
    tokens: TokenPair,
}

#[derive(Serialize)]
struct UserView {
    name: String,
    email: String,
    role: Role,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[post("/users", data = "<body>", format = "json")]
async fn register(body: Json<RegisterRequest>, service: &State<Service>) -> Result<Json<RegisterResponse>> {
    let (user, tokens) = service.register(&body.name, &body.email, &body.password).await?;
    Ok(Json(RegisterResponse {
        user: user.into(),
        tokens,
    }))
}

#[derive(Deserialize)]
struct LoginRequest {
    name: String,
    password: String,
}

#[post("/login", data = "<body>", format = "json")]
async fn login(body: Json<LoginRequest>, service: &State<Service>) -> Result<Json<TokenPair>> {
    let tokens = service.authenticate(&body.name, &body.password).await?;
    Ok(Json(tokens))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: String,
}

#[post("/refresh", data = "<body>", format = "json")]
fn refresh(body: Json<RefreshRequest>, service: &State<Service>) -> Result<Json<TokenPair>> {
    let tokens = service.tokens.refresh(&body.refresh)?;
    Ok(Json(tokens))
}

#[get("/users")]
async fn list_users(_caller: CallerIdentity, service: &State<Service>) -> Result<Json<Vec<UserView>>> {
    let users = service.list_users().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

#[get("/users/<name>")]
async fn find_user(name: String, _caller: CallerIdentity, service: &State<Service>) -> Result<Json<UserView>> {
    let user = service.find_user(&name).await?;
    Ok(Json(user.into()))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: Role,
}

#[post("/users/<name>/role", data = "<body>", format = "json")]
async fn set_role(
    name: String,
    body: Json<SetRoleRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.set_role(&caller.0, &name, body.role).await
}

#[derive(Deserialize)]
struct SetPasswordRequest {
    password: String,
}

#[post("/users/<name>/password", data = "<body>", format = "json")]
async fn set_password(
    name: String,
    body: Json<SetPasswordRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.set_password(&caller.0, &name, &body.password).await
}

#[derive(Deserialize)]
struct SetEmailRequest {
    email: String,
}

#[post("/users/<name>/email", data = "<body>", format = "json")]
async fn set_email(
    name: String,
    body: Json<SetEmailRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.set_email(&caller.0, &name, &body.email).await
}

#[derive(Deserialize)]
struct SetUserNameRequest {
    name: String,
}

#[post("/users/<name>/name", data = "<body>", format = "json")]
async fn set_user_name(
    name: String,
    body: Json<SetUserNameRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.set_user_name(&caller.0, &name, &body.name).await
}

#[delete("/users/<name>")]
async fn remove_user(name: String, caller: CallerIdentity, service: &State<Service>) -> Result<()> {
    service.remove_user(&caller.0, &name).await
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json::json;

    #[backend_test]
    async fn register_then_login(client: Client) {
        let response = client
            .post("/users")
            .header(ContentType::JSON)
            .body(json!({"name": "alice", "email": "alice@example.com", "password": "hunter2"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(json!({"name": "alice", "password": "hunter2"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test]
    async fn login_with_wrong_password_is_unauthorized(client: Client) {
        client
            .post("/users")
            .header(ContentType::JSON)
            .body(json!({"name": "alice", "email": "alice@example.com", "password": "hunter2"}).to_string())
            .dispatch()
            .await;

        let response = client
            .post("/login")
            .header(ContentType::JSON)
            .body(json!({"name": "alice", "password": "wrong"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test]
    async fn list_users_requires_a_token(client: Client) {
        let response = client.get("/users").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
