use capstan::auth::{DockerCredentials, IdentityTokenAuth, RegistryAuth, RegistryConfigAuth};
use capstan::errors::Error;
use capstan::{Docker, Inspectable, Removable, Resource};

use base64::{engine::general_purpose::URL_SAFE, Engine};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use std::sync::Arc;

#[macro_use]
pub mod common;
use crate::common::*;

async fn list_images_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let images: Vec<_> = docker.images().iter().await?.collect();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].id(), "sha256:1111");
    assert_eq!(
        images[1].endpoint().as_str(),
        format!("{}/images/sha256:2222", BASE)
    );
    assert_eq!(images[1].get("RepoTags"), Some(&json!(["alpine:3.19"])));
    assert_eq!(mock.last_request().uri, format!("{}/images/json", BASE));
    Ok(())
}

async fn pull_image_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let image = docker.images().pull("library/alpine", "3.19").await?;
    assert_eq!(image.id(), "library/alpine:3.19");
    assert_eq!(
        image.endpoint().as_str(),
        format!("{}/images/library/alpine:3.19", BASE)
    );

    let request = mock.last_request();
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.uri,
        format!("{}/images/create?fromImage=library%2Falpine&tag=3.19", BASE)
    );
    Ok(())
}

async fn pull_failure_test(docker: Docker, _: MockTransport) -> Result<(), Error> {
    match docker.images().pull("nope", "latest").await {
        Err(Error::DockerStreamError { error }) => {
            assert_eq!(error, "pull access denied for nope")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}

async fn image_handle_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let image = docker.images().get("alpine:3.19");

    assert_eq!(image.inspect().await?["Id"], "sha256:2222");
    assert_eq!(
        mock.last_request().uri,
        format!("{}/images/alpine:3.19/json", BASE)
    );

    let history = image.history().await?;
    assert_eq!(history[0]["CreatedBy"], "/bin/sh");

    image.tag("localhost:5000/alpine", "stable").await?;
    assert_eq!(
        mock.last_request().uri,
        format!("{}/images/alpine:3.19/tag?repo=localhost%3A5000%2Falpine&tag=stable", BASE)
    );

    image.remove().await?;
    let request = mock.last_request();
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.uri, format!("{}/images/alpine:3.19", BASE));
    Ok(())
}

async fn push_with_auth_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let auth = Arc::new(IdentityTokenAuth::new("localhost:5000", "t0k3n"));
    let docker = docker.with_registry_auth(auth.clone());

    docker
        .images()
        .get("localhost:5000/alpine")
        .push(Some("stable"))
        .await?;

    let request = mock.last_request();
    assert_eq!(
        request.uri,
        format!("{}/images/localhost:5000/alpine/push?tag=stable", BASE)
    );
    let header = request.headers["x-registry-auth"].to_str().unwrap().to_string();
    assert_eq!(header, auth.encoded()?);

    let decoded: Value = serde_json::from_slice(&URL_SAFE.decode(header).unwrap())?;
    assert_eq!(decoded, json!({"localhost:5000": {"identitytoken": "t0k3n"}}));
    Ok(())
}

async fn preset_auth_header_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let credentials = DockerCredentials {
        username: Some("capstan".to_string()),
        password: Some("s3cret".to_string()),
        ..Default::default()
    };
    let docker = docker.with_registry_auth(credentials.into_auth("localhost:5000").unwrap());

    docker.ping().await?;
    let request = mock.last_request();
    let expected = RegistryConfigAuth::new("localhost:5000", "capstan", "s3cret").encoded()?;
    assert_eq!(request.headers["x-registry-config"], expected.as_str());
    assert!(!request.headers.contains_key("x-registry-auth"));
    Ok(())
}

#[test]
fn integration_test_list_images() {
    connect_to_mock_and_run!(
        MockTransport::new().respond(
            200,
            r#"[{"Id":"sha256:1111","RepoTags":["hello-world:linux"]},{"Id":"sha256:2222","RepoTags":["alpine:3.19"]}]"#
        ),
        list_images_test
    );
}

#[test]
fn integration_test_pull_image() {
    connect_to_mock_and_run!(
        MockTransport::new().respond_chunked(
            200,
            vec![
                b"{\"status\":\"Pulling from library/alpine\",\"id\":\"3.19\"}\r\n".to_vec(),
                b"{\"status\":\"Download complete\"}\r\n{\"status\":\"Status: Downloaded newer image\"}\r\n".to_vec(),
            ]
        ),
        pull_image_test
    );
}

#[test]
fn integration_test_pull_failure() {
    connect_to_mock_and_run!(
        MockTransport::new().respond_chunked(
            200,
            vec![b"{\"errorDetail\":{\"message\":\"pull access denied for nope\"},\"error\":\"pull access denied for nope\"}\r\n".to_vec()]
        ),
        pull_failure_test
    );
}

#[test]
fn integration_test_image_handle() {
    connect_to_mock_and_run!(
        MockTransport::new()
            .respond(200, r#"{"Id":"sha256:2222","RepoTags":["alpine:3.19"]}"#)
            .respond(200, r#"[{"Id":"sha256:2222","CreatedBy":"/bin/sh"}]"#)
            .respond(201, "")
            .respond(200, r#"[{"Untagged":"alpine:3.19"}]"#),
        image_handle_test
    );
}

#[test]
fn integration_test_push_with_auth() {
    connect_to_mock_and_run!(
        MockTransport::new().respond_chunked(
            200,
            vec![b"{\"status\":\"Pushed\"}\n".to_vec()]
        ),
        push_with_auth_test
    );
}

#[test]
fn integration_test_preset_auth_header() {
    connect_to_mock_and_run!(MockTransport::new().respond(200, "OK"), preset_auth_header_test);
}

#[tokio::test]
async fn caller_auth_header_is_kept() {
    use capstan::transport::Transport;

    let mock = MockTransport::new().respond(200, "OK");
    let auth = Arc::new(IdentityTokenAuth::new("registry.example.com", "t0k3n"));
    let transport = capstan::auth::RegistryAuthTransport::new(mock.clone(), auth);

    let request = http::Request::builder()
        .uri(format!("{}/images/create", BASE))
        .header("X-Registry-Auth", "caller-supplied")
        .body(bytes::Bytes::new())
        .unwrap();
    transport.execute(request).await.unwrap();

    let recorded = mock.last_request();
    assert_eq!(recorded.headers["x-registry-auth"], "caller-supplied");
    assert_eq!(recorded.headers.get_all("x-registry-auth").iter().count(), 1);
}
