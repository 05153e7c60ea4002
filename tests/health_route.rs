use rocket::http::Status;
use rocket::routes;
use todo_api::routes::health::{HealthResponse, health_check};
use todo_api::test_support::TestRocketBuilder;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/v1/health").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthResponse = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
}

#[test]
fn unknown_path_renders_envelope() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/v1/nope").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert_eq!(body["code"], 404);
    assert_eq!(body["message"], "Resource not found");
}

#[test]
fn openapi_document_lists_auth_and_todo_paths() {
    let client = TestRocketBuilder::new()
        .mount_all_api_routes()
        .manage_auth_state(todo_api::test_support::memory_auth_state())
        .manage_todo_state(todo_api::test_support::memory_todo_state())
        .blocking_client();

    let response = client.get("/v1/openapi.json").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let document: serde_json::Value = response.into_json().expect("valid JSON payload");
    let paths = document["paths"].as_object().expect("paths object");
    for path in ["/auth/register", "/auth/login", "/auth/refresh", "/todos", "/todos/{id}"] {
        assert!(paths.contains_key(path), "missing {path}");
    }
    assert_eq!(
        paths["/todos/{id}"]["delete"]["summary"],
        "Delete one of the caller's todos"
    );
    let me = &paths["/auth/me"]["get"]["responses"]["200"];
    assert!(me.is_object(), "missing /auth/me response schema");
}

mod request_id {
    use rocket::http::{Header, Status};
    use rocket::local::blocking::{Client, LocalResponse};
    use rocket::routes;
    use todo_api::request_logger::REQUEST_ID_HEADER;
    use todo_api::routes::health::health_check;
    use todo_api::test_support::TestRocketBuilder;
    use uuid::Uuid;

    fn client() -> Client {
        TestRocketBuilder::new()
            .mount_api_routes(routes![health_check])
            .with_request_logger()
            .blocking_client()
    }

    fn request_id(response: &LocalResponse<'_>) -> String {
        response
            .headers()
            .get_one(REQUEST_ID_HEADER)
            .expect("request id header")
            .to_string()
    }

    #[test]
    fn echoes_acceptable_incoming_id() {
        let client = client();
        let response = client
            .get("/v1/health")
            .header(Header::new(REQUEST_ID_HEADER, "abc-1"))
            .dispatch();

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(request_id(&response), "abc-1");
    }

    #[test]
    fn assigns_fresh_id_when_missing() {
        let client = client();
        let first = client.get("/v1/health").dispatch();
        let first_id = request_id(&first);
        let second = client.get("/v1/health").dispatch();
        let second_id = request_id(&second);

        assert!(Uuid::parse_str(&first_id).is_ok(), "not a uuid: {first_id}");
        assert!(Uuid::parse_str(&second_id).is_ok(), "not a uuid: {second_id}");
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn replaces_oversized_or_unprintable_ids() {
        let client = client();
        for incoming in ["a".repeat(129), "has space".to_string(), "semi;colon".to_string()] {
            let response = client
                .get("/v1/health")
                .header(Header::new(REQUEST_ID_HEADER, incoming.clone()))
                .dispatch();

            let echoed = request_id(&response);
            assert_ne!(echoed, incoming);
            assert!(Uuid::parse_str(&echoed).is_ok(), "not a uuid: {echoed}");
        }
    }

    #[test]
    fn error_responses_carry_an_id() {
        let client = client();
        let response = client.get("/v1/nope").dispatch();

        assert_eq!(response.status(), Status::NotFound);
        assert!(Uuid::parse_str(&request_id(&response)).is_ok());
    }
}
