//! CLI smoke entry point.
//!
//! Opens the store named by the URI argument (default `memory:`), reports the
//! outcome and closes it again.

use std::process::ExitCode;

const DEFAULT_URI: &str = "memory:";

fn main() -> ExitCode {
    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_URI.to_string());

    println!("recstore_core version={}", recstore_core::core_version());

    let store = match recstore_core::Store::open(&uri) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("recstore open uri={uri} status=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "recstore open uri={uri} backend={} status=ok",
        store.config().backend.scheme()
    );

    match store.blob_retrieve("recstore-cli-check") {
        Ok(found) => println!("recstore blob_check status=ok present={}", found.is_some()),
        Err(err) => {
            eprintln!("recstore blob_check status=error error={err}");
            return ExitCode::FAILURE;
        }
    }

    if let Err(err) = store.close() {
        eprintln!("recstore close status=error error={err}");
        return ExitCode::FAILURE;
    }
    println!("recstore close status=ok");
    ExitCode::SUCCESS
}
