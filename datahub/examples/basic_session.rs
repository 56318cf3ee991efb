//! Minimal end-to-end run through the facade: create an Input, push a
//! sample, read it back. `RUST_LOG=debug` shows the push pipeline's
//! `tracing::debug!` call sites.

use datahub::DataHub;
use datahub_collab::{StaticIdentityProvider, TracingClientSink};
use datahub_config::HubConfig;
use datahub_core::DataKind;

fn main() {
    tracing_subscriber::fmt::init();

    let mut hub = DataHub::new(HubConfig::default());
    let identity = StaticIdentityProvider::new("demo-device");
    let sink = TracingClientSink;
    let mut session = hub.session(0, &identity, &sink).expect("identify client");

    session
        .create_input("/sensor/temp", DataKind::Numeric, "degC")
        .expect("create input");
    session
        .push_numeric("/sensor/temp", 0.0, 21.5, 1_700_000_000.0)
        .expect("push sample");

    let (ts, value) = session.get_numeric("/sensor/temp").expect("read back");
    println!("sensor/temp @ {ts}: {value}");
}
