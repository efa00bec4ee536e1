use capstan::errors::Error;
use capstan::{Docker, Inspectable, Removable, Resource};

use serde_json::{json, Value};
use tokio::runtime::Runtime;

#[macro_use]
pub mod common;
use crate::common::*;

async fn list_volumes_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let mut volumes = docker.volumes().iter().await?;

    let data = volumes.next().unwrap();
    assert_eq!(data.id(), "data");
    assert_eq!(data.get_str("Driver"), Some("local"));
    assert_eq!(data.endpoint().as_str(), format!("{}/volumes/data", BASE));
    assert_eq!(volumes.next().unwrap().id(), "logs");
    assert!(volumes.next().is_none());

    assert_eq!(mock.last_request().uri, format!("{}/volumes", BASE));
    Ok(())
}

async fn create_volume_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let config = match json!({"Name": "data", "Labels": {"tier": "db"}}) {
        Value::Object(config) => config,
        _ => unreachable!(),
    };
    let volume = docker.volumes().create_with(&config).await?;

    assert_eq!(volume.id(), "data");
    assert_eq!(volume.get_str("Mountpoint"), Some("/var/lib/docker/volumes/data/_data"));
    assert_eq!(mock.last_request().json(), json!({"Name": "data", "Labels": {"tier": "db"}}));

    assert_eq!(volume.inspect().await?["Scope"], "local");
    assert_eq!(mock.last_request().uri, format!("{}/volumes/data", BASE));
    Ok(())
}

async fn remove_volume_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let volume = docker.volumes().get("data");

    volume.remove_with(true).await?;
    let request = mock.last_request();
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.uri, format!("{}/volumes/data?force=true", BASE));

    assert_eq!(status_of(volume.remove().await.unwrap_err()), 409);
    assert_eq!(
        mock.last_request().uri,
        format!("{}/volumes/data?force=false", BASE)
    );
    Ok(())
}

async fn prune_volumes_test(docker: Docker, mock: MockTransport) -> Result<(), Error> {
    let report = docker.volumes().prune().await?;
    assert_eq!(report["VolumesDeleted"][0], "old");
    assert_eq!(mock.last_request().uri, format!("{}/volumes/prune", BASE));
    Ok(())
}

#[test]
fn integration_test_list_volumes() {
    connect_to_mock_and_run!(
        MockTransport::new().respond(
            200,
            r#"{"Volumes":[{"Name":"data","Driver":"local"},{"Name":"logs","Driver":"local"}],"Warnings":[]}"#
        ),
        list_volumes_test
    );
}

#[test]
fn integration_test_create_volume() {
    connect_to_mock_and_run!(
        MockTransport::new()
            .respond(
                201,
                r#"{"Name":"data","Driver":"local","Mountpoint":"/var/lib/docker/volumes/data/_data"}"#
            )
            .respond(200, r#"{"Name":"data","Driver":"local","Scope":"local"}"#),
        create_volume_test
    );
}

#[test]
fn integration_test_remove_volume() {
    connect_to_mock_and_run!(
        MockTransport::new()
            .respond(204, "")
            .respond(409, r#"{"message":"volume is in use"}"#),
        remove_volume_test
    );
}

#[test]
fn integration_test_prune_volumes() {
    connect_to_mock_and_run!(
        MockTransport::new().respond(200, r#"{"VolumesDeleted":["old"],"SpaceReclaimed":0}"#),
        prune_volumes_test
    );
}
