// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bstrap::remote::Remote;
use bstrap::target::RemoteTarget;

fn target(host: &str, port: u16) -> RemoteTarget {
    RemoteTarget::new(
        host.to_string(),
        port,
        "root".to_string(),
        "not a real key".to_string(),
    )
}

#[tokio::test]
async fn execute_against_a_closed_port_fails() {
    let mut remote = Remote::new(target("127.0.0.1", 1), None).unwrap();

    let result = remote.execute("echo test", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn mkdir_against_an_unresolvable_host_fails() {
    let mut remote = Remote::new(
        target("this.host.does.not.exist.invalid", 22),
        None,
    )
    .unwrap();

    let result = remote.mkdir("/srv/stage").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn upload_against_a_closed_port_fails() {
    let mut remote = Remote::new(target("127.0.0.1", 1), None).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("payload.txt");
    std::fs::write(&local, "hi").unwrap();

    let result = remote.upload_file(&local, "/srv/stage/payload.txt").await;
    assert!(result.is_err());
}
