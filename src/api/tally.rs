use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::service::Service;
use crate::tally::TallyResult;

use super::guard::CallerIdentity;

pub fn routes() -> Vec<Route> {
    routes![tally, list_tables, table_data]
}

#[get("/elections/<election_name>/tally")]
async fn tally(
    election_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<TallyResult>> {
    Ok(Json(service.tally(&caller.0, &election_name).await?))
}

#[get("/admin/tables")]
async fn list_tables(caller: CallerIdentity, service: &State<Service>) -> Result<Json<Vec<String>>> {
    Ok(Json(service.list_tables(&caller.0).await?))
}

#[get("/admin/tables/<table_name>")]
async fn table_data(
    table_name: String,
    caller: CallerIdentity,
    service: &State<Service>,
) -> Result<Json<Vec<rocket::serde::json::Value>>> {
    Ok(Json(service.table_data(&caller.0, &table_name).await?))
}
