use chrono::{DateTime, Utc};
use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::domain::{Candidate, Election};
use crate::error::Result;
use crate::service::Service;

use super::guard::CallerIdentity;

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        list_elections,
        find_election,
        update_election,
        launch_election,
        finalize_election,
        delete_election,
        list_candidates,
        add_candidates,
        remove_candidates,
        list_voters,
        add_voters,
        remove_voters,
    ]
}

#[derive(Deserialize)]
struct CreateElectionRequest {
    election_name: String,
}

#[post("/elections", data = "<body>", format = "json")]
async fn create_election(
    body: Json<CreateElectionRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Election>> {
    let election = service.create_election(&caller.0, &body.election_name).await?;
    Ok(Json(election))
}

#[get("/elections")]
async fn list_elections(_caller: CallerIdentity, service: &State<Service>) -> Result<Json<Vec<Election>>> {
    Ok(Json(service.list_elections().await?))
}

#[get("/elections/<election_name>")]
async fn find_election(
    election_name: String,
    _caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Election>> {
    Ok(Json(service.find_election(&election_name).await?))
}

#[derive(Deserialize)]
struct UpdateElectionRequest {
    #[serde(default)]
    secret_ballot: Option<bool>,
    #[serde(default)]
    allow_edit: Option<bool>,
    #[serde(default)]
    no_voting_before: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    no_voting_after: Option<Option<DateTime<Utc>>>,
}

#[post("/elections/<election_name>", data = "<body>", format = "json")]
async fn update_election(
    election_name: String,
    body: Json<UpdateElectionRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .update_election(
            &caller.0,
            &election_name,
            body.secret_ballot,
            body.allow_edit,
            body.no_voting_before,
            body.no_voting_after,
        )
        .await
}

#[derive(Deserialize)]
struct LaunchElectionRequest {
    #[serde(default)]
    allow_edit: bool,
}

#[post("/elections/<election_name>/launch", data = "<body>", format = "json")]
async fn launch_election(
    election_name: String,
    body: Json<LaunchElectionRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .launch_election(&caller.0, &election_name, body.allow_edit)
        .await
}

#[post("/elections/<election_name>/finalize")]
async fn finalize_election(
    election_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.finalize_election(&caller.0, &election_name).await
}

#[delete("/elections/<election_name>")]
async fn delete_election(
    election_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service.delete_election(&caller.0, &election_name).await
}

#[get("/elections/<election_name>/candidates")]
async fn list_candidates(
    election_name: String,
    _caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Vec<Candidate>>> {
    Ok(Json(service.list_candidates(&election_name).await?))
}

#[derive(Deserialize, Serialize)]
struct NamesRequest {
    names: Vec<String>,
}

#[post("/elections/<election_name>/candidates", data = "<body>", format = "json")]
async fn add_candidates(
    election_name: String,
    body: Json<NamesRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .add_candidates(&caller.0, &election_name, body.into_inner().names)
        .await
}

#[delete("/elections/<election_name>/candidates", data = "<body>", format = "json")]
async fn remove_candidates(
    election_name: String,
    body: Json<NamesRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .remove_candidates(&caller.0, &election_name, body.into_inner().names)
        .await
}

#[get("/elections/<election_name>/voters")]
async fn list_voters(
    election_name: String,
    _caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(service.list_voters(&election_name).await?))
}

#[post("/elections/<election_name>/voters", data = "<body>", format = "json")]
async fn add_voters(
    election_name: String,
    body: Json<NamesRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .add_voters(&caller.0, &election_name, body.into_inner().names)
        .await
}

#[delete("/elections/<election_name>/voters", data = "<body>", format = "json")]
async fn remove_voters(
    election_name: String,
    body: Json<NamesRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<()> {
    service
        .remove_voters(&caller.0, &election_name, body.into_inner().names)
        .await
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json::{json, Value};

    async fn registered_access_token(client: &Client, name: &str) -> String {
        let response = client
            .post("/users")
            .header(ContentType::JSON)
            .body(json!({"name": name, "email": format!("{name}@example.com"), "password": "hunter2"}).to_string())
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        body["tokens"]["access"].as_str().unwrap().to_string()
    }

    #[backend_test]
    async fn create_election_as_owner(client: Client) {
        let access = registered_access_token(&client, "alice").await;

        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .header(rocket::http::Header::new("Authorization", format!("Bearer {access}")))
            .body(json!({"election_name": "Best Language"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .get("/elections")
            .header(rocket::http::Header::new("Authorization", format!("Bearer {access}")))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[backend_test]
    async fn create_election_without_token_is_unauthorized(client: Client) {
        let response = client
            .post("/elections")
            .header(ContentType::JSON)
            .body(json!({"election_name": "Best Language"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
