fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use skydrop_protocol::{
        ApiErrorBody, ChunkAck, CompleteRequest, FileDescriptor, NegotiateRequest,
        SessionDescriptor,
    };
    use skydrop_uploader::{ErrorKind, IngestEntry, IngestOutcome, UploadEvent};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and requires the same JSON.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Session API requests ---

    #[test]
    fn fixture_negotiate_request() {
        let req: NegotiateRequest = roundtrip_test("negotiate_request.json");
        assert_eq!(req.total_size, 26_214_400);
        assert_eq!(req.upload_id.as_deref(), Some("up_5f3a9c21_1900000"));
    }

    #[test]
    fn fixture_complete_request() {
        let req: CompleteRequest = roundtrip_test("complete_request.json");
        assert_eq!(req.upload_id, "up_5f3a9c21_1900000");
    }

    // --- Session API responses ---

    #[test]
    fn fixture_negotiate_response() {
        let desc: SessionDescriptor = roundtrip_test("negotiate_response.json");
        assert_eq!(desc.chunk_size, 2 * 1024 * 1024);
        assert_eq!(desc.total_chunks, 13);
        assert_eq!(desc.uploaded_chunks, vec![0, 1, 2]);
    }

    #[test]
    fn fixture_chunk_ack() {
        let ack: ChunkAck = roundtrip_test("chunk_ack.json");
        assert_eq!(ack.chunk_index, 3);
    }

    #[test]
    fn fixture_file_descriptor() {
        let file: FileDescriptor = roundtrip_test("file_descriptor.json");
        assert_eq!(file.id, 42);
        assert_eq!(file.parent_id, Some(7));
    }

    #[test]
    fn fixture_file_descriptor_from_server() {
        // Server descriptors carry nulls and fields the client does not model.
        let fixture = load_fixture("file_descriptor_server.json");
        let file: FileDescriptor = serde_json::from_value(fixture).unwrap();
        assert_eq!(file.id, 43);
        assert_eq!(file.name, "notes.txt");
        assert!(file.description.is_none());
        assert!(file.parent_id.is_none());
        assert_eq!(file.file_size, Some(19));
    }

    #[test]
    fn fixture_error_detail() {
        let body: ApiErrorBody = roundtrip_test("error_detail.json");
        assert_eq!(body.reason(), Some("Upload session not found"));
    }

    // --- Engine events ---

    #[test]
    fn fixture_upload_event_status() {
        let event: UploadEvent = roundtrip_test("upload_event_status.json");
        assert!(matches!(event, UploadEvent::Status { .. }));
    }

    #[test]
    fn fixture_upload_event_failed() {
        let event: UploadEvent = roundtrip_test("upload_event_failed.json");
        match event {
            UploadEvent::Failed { kind, .. } => assert_eq!(kind, ErrorKind::FinalizeFailed),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn fixture_ingest_entry() {
        let entry: IngestEntry = roundtrip_test("ingest_entry.json");
        assert_eq!(entry.file_name, "big.bin");
        assert_eq!(
            entry.outcome,
            IngestOutcome::Failure {
                kind: ErrorKind::Rejected,
                reason: "File too large".into()
            }
        );
    }
}
