use std::sync::Arc;

use ingest::{file_type_for_content_type, IngestFileStager, RecordingEvents, StagingConfig};

fn main() {
    let dir = tempfile::tempdir().expect("scratch dir");
    let events = Arc::new(RecordingEvents::new());
    let stager = IngestFileStager::new(StagingConfig::new(dir.path()))
        .expect("valid config")
        .with_events(events.clone());

    // The first `meta` names an unknown category and is skipped; the second wins.
    let body = br#"{"meta":{"type":"printers"},"meta":{"type":"domains","methods":33,"version":6},"data":[{"name":"CORP.LOCAL"}]}"#;
    let file_type = file_type_for_content_type("application/json");

    match stager.stage(&body[..], file_type) {
        Ok(staged) => {
            println!("Staged file: {}", staged.path.display());
            println!("Metadata: {:?}", staged.metadata);
        }
        Err(err) => eprintln!("Staging failed: {err}"),
    }

    for event in events.events() {
        println!("{event:?}");
    }
}
