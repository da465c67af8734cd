use ingest::{FileType, IngestFileStager, StagingConfig};

fn main() {
    println!("--- Demonstrating Upload Size Cap ---");

    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("could not create scratch dir: {err}");
            return;
        }
    };
    let cfg = StagingConfig::new(dir.path()).with_max_upload_bytes(64);
    let stager = match IngestFileStager::new(cfg) {
        Ok(stager) => stager,
        Err(err) => {
            eprintln!("bad staging config: {err}");
            return;
        }
    };

    // --- Case 1: Upload within the cap ---
    println!("\n1. Staging a document that fits under the 64 byte cap...");
    let small = br#"{"meta":{"type":"ous","version":6},"data":[]}"#; // 45 bytes
    match stager.stage(&small[..], FileType::StructuredDocument) {
        Ok(staged) => println!(
            " -> Success! Staged {} bytes at {}",
            staged.bytes_written,
            staged.path.display()
        ),
        Err(err) => eprintln!(" -> Unexpected Error: {err}"),
    }

    // --- Case 2: Upload over the cap ---
    println!("\n2. Staging a document that is over the cap...");
    let large = br#"{"meta":{"type":"ous","version":6},"data":[{"name":"OU=Finance,DC=corp,DC=local"}]}"#;
    match stager.stage(&large[..], FileType::StructuredDocument) {
        Ok(_) => eprintln!(" -> Unexpected Success!"),
        Err(err) => println!(
            " -> Success! Caught expected error ({}): {err}",
            err.http_status_code()
        ),
    }

    // --- Case 3: Archive over the cap ---
    println!("\n3. Staging an archive that is over the cap...");
    let mut archive = b"PK\x03\x04".to_vec();
    archive.resize(128, 0);
    match stager.stage(archive.as_slice(), FileType::Archive) {
        Ok(_) => eprintln!(" -> Unexpected Success!"),
        Err(err) => println!(" -> Success! Caught expected error: {err}"),
    }
}
