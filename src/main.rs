#[rocket::launch]
fn rocket() -> _ {
    account_server::rocket()
}
