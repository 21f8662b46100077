use rocket::Route;

mod ballots;
mod elections;
mod guard;
mod tally;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(users::routes());
    routes.extend(elections::routes());
    routes.extend(ballots::routes());
    routes.extend(tally::routes());
    routes
}
