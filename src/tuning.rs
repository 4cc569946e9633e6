//! Operator-driven calibration tuning.
//!
//! A [`TuningSession`] walks one cycle of
//! `Idle -> Reading -> Proposing -> AwaitingConfirmation -> Applying -> Idle`.
//! Each call is a single step; the operator repeats cycles until the observed
//! color is close enough to the reference. Nothing is written until
//! [`TuningSession::apply`], and only confirmed proposals are considered.

use crate::constants::{self, targets};
use crate::error::ColorSenseError;
use crate::record::Rgb;
use crate::state::{CalibrationState, MatrixKind, SettingKey};
use crate::store::SettingsStore;
use crate::transform::{transform, SensorSample, TransformOutput};

use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Configuration
// =============================================================================

/// Knobs of the proposal heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningConfig {
    /// Errors with `|err| <= deadband` produce no proposal.
    pub deadband: i32,
    /// Magnitude of every proposed delta.
    pub step: f64,
    /// Coefficients may not leave `[-safety_bound, safety_bound]`.
    pub safety_bound: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            deadband: constants::tuning::DEADBAND,
            step: constants::tuning::STEP,
            safety_bound: constants::tuning::SAFETY_BOUND,
        }
    }
}

/// An output color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
}

impl Channel {
    /// All channels in RGB order.
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Index of the matrix coefficient that maps this channel's own input.
    pub fn diagonal_index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 4,
            Channel::Blue => 8,
        }
    }

    fn of(self, rgb: Rgb) -> u8 {
        match self {
            Channel::Red => rgb.r,
            Channel::Green => rgb.g,
            Channel::Blue => rgb.b,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Red => f.write_str("R"),
            Channel::Green => f.write_str("G"),
            Channel::Blue => f.write_str("B"),
        }
    }
}

/// The physical sample held under the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// White reference tile.
    VividWhite,
    /// Grey reference tile.
    GreyPort,
    /// Any other sample with a known color.
    Custom(Rgb),
}

impl ReferenceTarget {
    /// The color the sensor should report for this sample.
    pub fn rgb(self) -> Rgb {
        match self {
            ReferenceTarget::VividWhite => Rgb::from(targets::VIVID_WHITE),
            ReferenceTarget::GreyPort => Rgb::from(targets::GREY_PORT),
            ReferenceTarget::Custom(rgb) => rgb,
        }
    }
}

impl FromStr for ReferenceTarget {
    type Err = ColorSenseError;

    /// Accepts `vivid-white`, `grey-port` or `R,G,B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ColorSenseError::InvalidSettingValue {
            key: "target".to_string(),
            value: s.to_string(),
        };
        match s.trim().to_ascii_lowercase().as_str() {
            "vivid-white" | "white" => Ok(ReferenceTarget::VividWhite),
            "grey-port" | "grey" | "gray" => Ok(ReferenceTarget::GreyPort),
            other => {
                let channels = other
                    .split(',')
                    .map(|c| c.trim().parse::<u8>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| invalid())?;
                match channels[..] {
                    [r, g, b] => Ok(ReferenceTarget::Custom(Rgb::new(r, g, b))),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTarget::VividWhite => write!(f, "vivid white {}", self.rgb()),
            ReferenceTarget::GreyPort => write!(f, "grey port {}", self.rgb()),
            ReferenceTarget::Custom(rgb) => write!(f, "custom {rgb}"),
        }
    }
}

// =============================================================================
// Readings, Proposals and Reports
// =============================================================================

/// A transform result compared against the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningReading {
    /// Transform output for the sample.
    pub output: TransformOutput,
    /// Expected color.
    pub target: Rgb,
    /// `observed - target` per channel, red first.
    pub error: [i32; 3],
}

impl TuningReading {
    fn new(output: TransformOutput, target: Rgb) -> Self {
        let error = Channel::ALL
            .map(|c| i32::from(c.of(output.rgb)) - i32::from(c.of(target)));
        Self {
            output,
            target,
            error,
        }
    }

    /// Signed error for one channel.
    pub fn error_of(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Red => self.error[0],
            Channel::Green => self.error[1],
            Channel::Blue => self.error[2],
        }
    }
}

/// A suggested change to one matrix coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    /// Matrix that produced the reading.
    pub matrix: MatrixKind,
    /// Coefficient index, row-major.
    pub index: usize,
    /// Amount to add.
    pub delta: f64,
    /// Channel being corrected.
    pub channel: Channel,
    /// The error that triggered the proposal.
    pub error: i32,
}

impl Proposal {
    /// The flat setting key this proposal writes, e.g. `darkMatrix0`.
    pub fn key(&self) -> SettingKey {
        SettingKey::Matrix(self.matrix, self.index)
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:+} ({} error {:+})", self.key(), self.delta, self.channel, self.error)
    }
}

/// A proposal that was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedChange {
    /// What was applied.
    pub proposal: Proposal,
    /// Coefficient before.
    pub previous: f64,
    /// Coefficient after.
    pub value: f64,
}

/// Outcome of [`TuningSession::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Proposals written and persisted.
    pub applied: Vec<AppliedChange>,
    /// Proposals refused, with the reason.
    pub rejected: Vec<(Proposal, ColorSenseError)>,
}

impl ApplyReport {
    /// Whether nothing was written.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Apply one proposal to `state`.
///
/// # Errors
/// [`ColorSenseError::SafetyClamp`] if the new value would exceed `bound` in
/// magnitude; `state` is then left untouched.
pub fn apply_proposal(
    state: &mut CalibrationState,
    proposal: &Proposal,
    bound: f64,
) -> Result<f64, ColorSenseError> {
    let coefficient = &mut state.matrix_mut(proposal.matrix).0[proposal.index];
    let value = *coefficient + proposal.delta;
    if value.is_nan() || value.abs() > bound {
        warn!("rejecting {}: {} exceeds safety bound {}", proposal.key(), value, bound);
        return Err(ColorSenseError::SafetyClamp {
            key: proposal.key().to_string(),
            value,
            bound,
        });
    }
    *coefficient = value;
    Ok(value)
}

// =============================================================================
// Tuning Session
// =============================================================================

/// Where a [`TuningSession`] is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningPhase {
    /// Ready for a reading.
    Idle,
    /// A reading has been taken.
    Reading,
    /// Proposals are being computed.
    Proposing,
    /// Proposals are waiting for the operator.
    AwaitingConfirmation,
    /// Confirmed proposals are being written.
    Applying,
}

impl TuningPhase {
    fn name(self) -> &'static str {
        match self {
            TuningPhase::Idle => "idle",
            TuningPhase::Reading => "reading",
            TuningPhase::Proposing => "proposing",
            TuningPhase::AwaitingConfirmation => "awaiting confirmation",
            TuningPhase::Applying => "applying",
        }
    }
}

impl fmt::Display for TuningPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One operator tuning session against a fixed reference target.
///
/// # Example
///
/// ```
/// use colorsense_core::{
///     CalibrationState, MemoryStore, ReferenceTarget, SensorSample, TuningSession,
/// };
///
/// let store = MemoryStore::new();
/// let mut state = CalibrationState::default();
/// let mut session = TuningSession::new(ReferenceTarget::GreyPort);
///
/// session.read(SensorSample::new(9000, 7000, 6000, 150, 120), &state).unwrap();
/// let proposals = session.propose().unwrap().to_vec();
/// session.confirm_all().unwrap();
/// let report = session.apply(&mut state, &store).unwrap();
///
/// assert_eq!(report.applied.len() + report.rejected.len(), proposals.len());
/// ```
#[derive(Debug, Clone)]
pub struct TuningSession {
    config: TuningConfig,
    target: ReferenceTarget,
    phase: TuningPhase,
    reading: Option<TuningReading>,
    proposals: Vec<Proposal>,
    confirmed: Vec<usize>,
}

impl TuningSession {
    /// Start an idle session with the default configuration.
    pub fn new(target: ReferenceTarget) -> Self {
        Self::with_config(target, TuningConfig::default())
    }

    /// Start an idle session with a custom configuration.
    pub fn with_config(target: ReferenceTarget, config: TuningConfig) -> Self {
        Self {
            config,
            target,
            phase: TuningPhase::Idle,
            reading: None,
            proposals: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TuningPhase {
        self.phase
    }

    /// Reference target.
    pub fn target(&self) -> ReferenceTarget {
        self.target
    }

    /// Active configuration.
    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    /// The last reading, if one has been taken this cycle.
    pub fn reading(&self) -> Option<&TuningReading> {
        self.reading.as_ref()
    }

    /// Proposals of this cycle.
    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    fn expect_phase(&self, expected: TuningPhase, action: &'static str) -> Result<(), ColorSenseError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ColorSenseError::InvalidTransition {
                action,
                phase: self.phase.name(),
            })
        }
    }

    /// Transform `sample` with `state` and compare it against the target.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] unless the session is idle.
    pub fn read(&mut self, sample: SensorSample, state: &CalibrationState) -> Result<&TuningReading, ColorSenseError> {
        self.expect_phase(TuningPhase::Idle, "read")?;

        let reading = TuningReading::new(transform(&sample, state), self.target.rgb());
        info!(
            "observed {} via {}, target {}, error {:?}",
            reading.output.rgb, reading.output.path, reading.target, reading.error
        );
        self.phase = TuningPhase::Reading;
        Ok(self.reading.insert(reading))
    }

    /// Propose one step per channel whose error is outside the deadband.
    ///
    /// Proposals target the diagonal coefficient of the matrix that produced
    /// the reading. A reading taken through linear scaling yields none.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] unless a reading was just taken.
    pub fn propose(&mut self) -> Result<&[Proposal], ColorSenseError> {
        self.expect_phase(TuningPhase::Reading, "propose")?;
        let Some(reading) = self.reading else {
            return Err(ColorSenseError::InvalidTransition {
                action: "propose",
                phase: self.phase.name(),
            });
        };
        self.phase = TuningPhase::Proposing;

        self.proposals = match reading.output.path.matrix() {
            Some(matrix) => Channel::ALL
                .into_iter()
                .filter_map(|channel| {
                    let error = reading.error_of(channel);
                    (error.abs() > self.config.deadband).then(|| Proposal {
                        matrix,
                        index: channel.diagonal_index(),
                        delta: -f64::from(error.signum()) * self.config.step,
                        channel,
                        error,
                    })
                })
                .collect(),
            None => {
                info!("matrix calibration is off, nothing to tune");
                Vec::new()
            }
        };
        self.confirmed.clear();

        for proposal in &self.proposals {
            debug!("proposed {proposal}");
        }
        self.phase = TuningPhase::AwaitingConfirmation;
        Ok(&self.proposals)
    }

    /// Confirm every pending proposal.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] unless proposals are pending.
    pub fn confirm_all(&mut self) -> Result<(), ColorSenseError> {
        self.expect_phase(TuningPhase::AwaitingConfirmation, "confirm")?;
        self.confirmed = (0..self.proposals.len()).collect();
        Ok(())
    }

    /// Confirm the proposals at `indices`, replacing any earlier confirmation.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] unless proposals are pending,
    /// [`ColorSenseError::UnknownProposal`] for an index with no proposal.
    pub fn confirm(&mut self, indices: &[usize]) -> Result<(), ColorSenseError> {
        self.expect_phase(TuningPhase::AwaitingConfirmation, "confirm")?;
        if let Some(&index) = indices.iter().find(|&&i| i >= self.proposals.len()) {
            return Err(ColorSenseError::UnknownProposal {
                index,
                pending: self.proposals.len(),
            });
        }
        let mut confirmed = indices.to_vec();
        confirmed.sort_unstable();
        confirmed.dedup();
        self.confirmed = confirmed;
        Ok(())
    }

    /// Write confirmed proposals into `state` and persist them.
    ///
    /// Proposals past the safety bound are reported as rejected while the
    /// rest still apply. The store is written once, and `state` is updated
    /// only after that write succeeds. Unconfirmed proposals are dropped.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] unless proposals are pending.
    /// A store failure is returned as is; `state` is unchanged and the
    /// proposals stay pending so the apply can be retried.
    pub fn apply(
        &mut self,
        state: &mut CalibrationState,
        store: &dyn SettingsStore,
    ) -> Result<ApplyReport, ColorSenseError> {
        self.expect_phase(TuningPhase::AwaitingConfirmation, "apply")?;
        self.phase = TuningPhase::Applying;

        let mut next = state.clone();
        let mut report = ApplyReport::default();
        for &i in &self.confirmed {
            let proposal = self.proposals[i];
            let previous = next.matrix(proposal.matrix).0[proposal.index];
            match apply_proposal(&mut next, &proposal, self.config.safety_bound) {
                Ok(value) => report.applied.push(AppliedChange {
                    proposal,
                    previous,
                    value,
                }),
                Err(e) => report.rejected.push((proposal, e)),
            }
        }

        if !report.is_noop() {
            if let Err(e) = store.save(&next) {
                warn!("failed to persist calibration: {e}");
                self.phase = TuningPhase::AwaitingConfirmation;
                return Err(e);
            }
            *state = next;
        }

        for change in &report.applied {
            info!("applied {}: {} -> {}", change.proposal.key(), change.previous, change.value);
        }
        self.reset();
        Ok(report)
    }

    /// Abandon the cycle. Allowed in every phase but `Applying`; nothing is written.
    ///
    /// # Errors
    /// [`ColorSenseError::InvalidTransition`] while applying.
    pub fn cancel(&mut self) -> Result<(), ColorSenseError> {
        if self.phase == TuningPhase::Applying {
            return Err(ColorSenseError::InvalidTransition {
                action: "cancel",
                phase: self.phase.name(),
            });
        }
        debug!("tuning cycle cancelled in phase {}", self.phase);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = TuningPhase::Idle;
        self.reading = None;
        self.proposals.clear();
        self.confirmed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CalibrationMatrix;
    use crate::store::MemoryStore;

    fn grey_state() -> CalibrationState {
        CalibrationState {
            dark_matrix: CalibrationMatrix([0.035, 0.0, 0.0, 0.0, 0.02, 0.0, 0.0, 0.0, 0.0294]),
            ir1_comp: 0.0,
            ir2_comp: 0.0,
            ..Default::default()
        }
    }

    // Gives (175, 160, 147) through the dark matrix of `grey_state`.
    const SAMPLE: SensorSample = SensorSample::new(5000, 8000, 5000, 0, 0);

    #[test]
    fn test_red_error_proposes_single_dark_step() {
        let state = grey_state();
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);

        let reading = session.read(SAMPLE, &state).unwrap();
        assert_eq!(reading.output.rgb, Rgb::new(175, 160, 147));
        assert_eq!(reading.error, [7, 0, 0]);

        let proposals = session.propose().unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].key().to_string(), "darkMatrix0");
        assert_eq!(proposals[0].delta, -0.001);
        assert_eq!(proposals[0].channel, Channel::Red);
        assert_eq!(session.phase(), TuningPhase::AwaitingConfirmation);
    }

    #[test]
    fn test_apply_writes_and_persists() {
        let store = MemoryStore::new();
        let mut state = grey_state();
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);

        session.read(SAMPLE, &state).unwrap();
        session.propose().unwrap();
        session.confirm_all().unwrap();
        let report = session.apply(&mut state, &store).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert!(report.rejected.is_empty());
        assert!((state.dark_matrix.0[0] - 0.034).abs() < 1e-12);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot(), state);
        assert_eq!(session.phase(), TuningPhase::Idle);
    }

    #[test]
    fn test_deadband_is_exclusive() {
        let state = grey_state();
        let config = TuningConfig::default();
        // Red and green sit exactly on the deadband.
        let mut session = TuningSession::with_config(ReferenceTarget::Custom(Rgb::new(173, 158, 150)), config);

        session.read(SAMPLE, &state).unwrap();
        let errors = session.reading().unwrap().error;
        assert_eq!(errors, [2, 2, -3]);

        let proposals = session.propose().unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].channel, Channel::Blue);
        assert_eq!(proposals[0].index, 8);
        assert_eq!(proposals[0].delta, 0.001);
    }

    #[test]
    fn test_safety_bound_rejects_and_keeps_state() {
        let store = MemoryStore::new();
        let mut state = grey_state();
        state.dark_matrix.0[0] = 0.9997;
        let before = state.clone();

        let mut session = TuningSession::new(ReferenceTarget::GreyPort);
        // Red reads 100, well under the target, so the step is positive.
        session.read(SensorSample::new(100, 8000, 5000, 0, 0), &state).unwrap();
        let proposals = session.propose().unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].delta, 0.001);

        session.confirm_all().unwrap();
        let report = session.apply(&mut state, &store).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0].1, ColorSenseError::SafetyClamp { .. }));
        assert!(report.rejected[0].1.is_recoverable());
        assert_eq!(state, before);
        assert_eq!(store.save_count(), 0);
        assert_eq!(session.phase(), TuningPhase::Idle);
    }

    #[test]
    fn test_apply_proposal_bound() {
        let mut state = grey_state();
        let proposal = Proposal {
            matrix: MatrixKind::Bright,
            index: 4,
            delta: -0.001,
            channel: Channel::Green,
            error: 5,
        };

        state.bright_matrix.0[4] = -0.9995;
        let before = state.clone();
        let err = apply_proposal(&mut state, &proposal, 1.0).unwrap_err();
        assert!(matches!(err, ColorSenseError::SafetyClamp { ref key, .. } if key == "brightMatrix4"));
        assert_eq!(state, before);

        state.bright_matrix.0[4] = 0.5;
        let value = apply_proposal(&mut state, &proposal, 1.0).unwrap();
        assert!((value - 0.499).abs() < 1e-12);
        assert_eq!(state.bright_matrix.0[4], value);
    }

    #[test]
    fn test_cancel_has_no_side_effects() {
        let store = MemoryStore::new();
        let state = grey_state();
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);

        session.read(SAMPLE, &state).unwrap();
        session.propose().unwrap();
        session.confirm_all().unwrap();
        session.cancel().unwrap();

        assert_eq!(session.phase(), TuningPhase::Idle);
        assert!(session.proposals().is_empty());
        assert!(session.reading().is_none());
        assert_eq!(store.save_count(), 0);
        assert_eq!(state, grey_state());
    }

    #[test]
    fn test_unconfirmed_proposals_are_not_applied() {
        let store = MemoryStore::new();
        let mut state = grey_state();
        let mut session = TuningSession::new(ReferenceTarget::VividWhite);

        session.read(SAMPLE, &state).unwrap();
        assert_eq!(session.propose().unwrap().len(), 3);
        session.confirm(&[2, 2]).unwrap();
        let report = session.apply(&mut state, &store).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].proposal.channel, Channel::Blue);
        assert_eq!(state.dark_matrix.0[0], 0.035);
    }

    #[test]
    fn test_confirm_rejects_unknown_index() {
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);
        session.read(SAMPLE, &grey_state()).unwrap();
        session.propose().unwrap();

        let err = session.confirm(&[0, 5]).unwrap_err();
        assert!(matches!(err, ColorSenseError::UnknownProposal { index: 5, pending: 1 }));
        assert!(err.is_recoverable());

        // The session still waits for a valid confirmation.
        assert_eq!(session.phase(), TuningPhase::AwaitingConfirmation);
        session.confirm(&[0]).unwrap();
    }

    #[test]
    fn test_failed_save_leaves_state_unchanged() {
        let store = MemoryStore::failing();
        let mut state = grey_state();
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);

        session.read(SAMPLE, &state).unwrap();
        session.propose().unwrap();
        session.confirm_all().unwrap();

        assert!(matches!(session.apply(&mut state, &store), Err(ColorSenseError::Io(_))));
        assert_eq!(state, grey_state());
        assert_eq!(session.phase(), TuningPhase::AwaitingConfirmation);
        assert_eq!(session.proposals().len(), 1);
    }

    #[test]
    fn test_wrong_phase_is_invalid_transition() {
        let state = grey_state();
        let store = MemoryStore::new();
        let mut session = TuningSession::new(ReferenceTarget::GreyPort);

        assert!(matches!(session.propose(), Err(ColorSenseError::InvalidTransition { action: "propose", .. })));
        assert!(matches!(session.confirm_all(), Err(ColorSenseError::InvalidTransition { .. })));
        let mut copy = state.clone();
        assert!(matches!(
            session.apply(&mut copy, &store),
            Err(ColorSenseError::InvalidTransition { phase: "idle", .. })
        ));

        session.read(SAMPLE, &state).unwrap();
        assert!(matches!(session.read(SAMPLE, &state), Err(ColorSenseError::InvalidTransition { .. })));
    }

    #[test]
    fn test_linear_path_yields_no_proposals() {
        let state = CalibrationState {
            use_matrix_calibration: false,
            ..grey_state()
        };
        let mut session = TuningSession::new(ReferenceTarget::VividWhite);

        session.read(SAMPLE, &state).unwrap();
        assert!(session.propose().unwrap().is_empty());
    }

    #[test]
    fn test_reference_target_parse() {
        assert_eq!("vivid-white".parse::<ReferenceTarget>().unwrap().rgb(), Rgb::new(247, 248, 244));
        assert_eq!("grey-port".parse::<ReferenceTarget>().unwrap(), ReferenceTarget::GreyPort);
        assert_eq!(
            "10, 20,30".parse::<ReferenceTarget>().unwrap(),
            ReferenceTarget::Custom(Rgb::new(10, 20, 30))
        );
        assert!("10,20".parse::<ReferenceTarget>().is_err());
        assert!("10,20,300".parse::<ReferenceTarget>().is_err());
        assert!("beige".parse::<ReferenceTarget>().is_err());
    }
}
