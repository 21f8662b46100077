use rocket::{serde::json::Json, Route, State};
use serde::Deserialize;

use crate::domain::{Ballot, Rank};
use crate::error::Result;
use crate::query::BallotView;
use crate::service::Service;

use super::guard::CallerIdentity;

pub fn routes() -> Vec<Route> {
    routes![cast_ballot, search_ballot, list_ballots]
}

#[derive(Deserialize)]
struct CastBallotRequest {
    rankings: Vec<Rank>,
}

#[post("/elections/<election_name>/ballot", data = "<body>", format = "json")]
async fn cast_ballot(
    election_name: String,
    body: Json<CastBallotRequest>,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Ballot>> {
    let ballot = service
        .cast_ballot(&caller.0, &election_name, body.into_inner().rankings)
        .await?;
    Ok(Json(ballot))
}

#[get("/elections/<election_name>/ballots/<voter_name>")]
async fn search_ballot(
    election_name: String,
    voter_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Option<BallotView>>> {
    let ballot = service
        .search_ballot(&caller.0, &voter_name, &election_name)
        .await?;
    Ok(Json(ballot))
}

#[get("/elections/<election_name>/ballots")]
async fn list_ballots(
    election_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Vec<BallotView>>> {
    Ok(Json(service.list_ballots(&caller.0, &election_name).await?))
}
