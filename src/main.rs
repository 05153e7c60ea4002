#[rocket::launch]
fn rocket() -> _ {
    let rocket = todo_api::rocket();
    log::info!("Starting Todo API Server");
    rocket
}
