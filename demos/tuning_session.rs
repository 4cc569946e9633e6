//! Example: Tune the dark matrix against the grey reference tile.
//!
//! Run with: `cargo run --example tuning_session`

use colorsense_core::{
    CalibrationState, ColorSenseError, MemoryStore, ReferenceTarget, SensorSample, SettingsStore,
    TuningPhase, TuningSession,
};

fn main() -> Result<(), ColorSenseError> {
    // Initialize logging (optional)
    env_logger::init();

    // A sensor that reads the grey tile too red
    let store = MemoryStore::with_state(CalibrationState {
        ir1_comp: 0.0,
        ir2_comp: 0.0,
        ..Default::default()
    });
    let mut state = store.load()?;
    state.set("darkMatrix0", "0.036")?;
    state.set("darkMatrix4", "0.02")?;
    state.set("darkMatrix8", "0.0294")?;
    for key in ["darkMatrix1", "darkMatrix2", "darkMatrix3", "darkMatrix5", "darkMatrix6", "darkMatrix7"] {
        state.set(key, "0")?;
    }
    let sample = SensorSample::new(5000, 8000, 5000, 0, 0);

    let mut session = TuningSession::new(ReferenceTarget::GreyPort);
    for cycle in 1..=5 {
        let reading = session.read(sample, &state)?;
        println!(
            "cycle {cycle}: observed {} via {}, error {:?}",
            reading.output.rgb, reading.output.path, reading.error
        );

        let proposals = session.propose()?;
        if proposals.is_empty() {
            println!("Within deadband, done");
            session.cancel()?;
            break;
        }
        for proposal in proposals {
            println!("  proposing {proposal}");
        }

        session.confirm_all()?;
        let report = session.apply(&mut state, &store)?;
        for (proposal, error) in &report.rejected {
            eprintln!("  rejected {}: {}", proposal.key(), error);
        }
        assert_eq!(session.phase(), TuningPhase::Idle);
    }

    println!("darkMatrix0 is now {}", state.get("darkMatrix0")?);
    println!("{} saves", store.save_count());
    Ok(())
}
