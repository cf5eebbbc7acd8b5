//! Generic session container: config, input, intermediate state, output.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use super::problem_type::{InvalidationPolicy, ProblemType};
use super::types::{ExportRecord, LogEntry, SessionMetadata};

/// Mutable state container that step functions operate on.
///
/// Holds one final output at a time. Replacing the input applies
/// [`ProblemType::on_input_change`]; replacing the config applies
/// [`ProblemType::on_config_change`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "P: ProblemType")]
pub struct PriorSession<P: ProblemType> {
    pub metadata: SessionMetadata,
    pub config: P::Config,
    input: Option<P::Input>,
    pub state: P::State,
    output: Option<P::Output>,
    pub exports: Vec<ExportRecord<P::Export>>,
    pub log: Vec<LogEntry>,
}

impl<P: ProblemType> PriorSession<P> {
    pub fn new() -> Self {
        Self {
            metadata: SessionMetadata::new(P::name(), P::schema_version()),
            config: P::Config::default(),
            input: None,
            state: P::State::default(),
            output: None,
            exports: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Session with a validated config and no input.
    pub fn with_config(config: P::Config) -> Result<Self> {
        let mut session = Self::new();
        session.set_config(config)?;
        Ok(session)
    }

    fn invalidate(&mut self, policy: InvalidationPolicy) {
        if policy.clear_state {
            self.state = P::State::default();
        }
        if policy.clear_output {
            self.output = None;
        }
    }

    /// # Errors
    ///
    /// Returns an error if [`ProblemType::validate_input`] rejects `input`.
    pub fn set_input(&mut self, input: P::Input) -> Result<()> {
        P::validate_input(&input)?;
        self.invalidate(P::on_input_change());
        self.input = Some(input);
        self.metadata.touch();
        Ok(())
    }

    pub fn input(&self) -> Option<&P::Input> {
        self.input.as_ref()
    }

    pub fn require_input(&self) -> Result<&P::Input> {
        self.input.as_ref().ok_or_else(|| anyhow!("input not set"))
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// # Errors
    ///
    /// Returns an error if [`ProblemType::validate_config`] rejects `config`.
    pub fn set_config(&mut self, config: P::Config) -> Result<()> {
        P::validate_config(&config)?;
        self.invalidate(P::on_config_change());
        self.config = config;
        self.metadata.touch();
        Ok(())
    }

    pub fn update_config<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut P::Config),
    {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }

    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    pub fn require_output(&self) -> Result<&P::Output> {
        self.output
            .as_ref()
            .ok_or_else(|| anyhow!("output not computed"))
    }

    pub fn set_output(&mut self, output: P::Output) {
        self.output = Some(output);
        self.metadata.touch();
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Convert the output with [`ProblemType::export`] and record it.
    pub fn export(&mut self) -> Result<P::Export> {
        let export = P::export(self.require_output()?, &self.config)?;
        self.exports.push(ExportRecord::new(export.clone()));
        self.metadata.touch();
        Ok(export)
    }

    /// Check input, config, and their combination.
    pub fn validate(&self) -> Result<()> {
        let input = self.require_input()?;
        P::validate_input(input)?;
        P::validate_config(&self.config)?;
        P::validate_input_config(input, &self.config)
    }

    pub fn log_success_with_notes(
        &mut self,
        operation: impl Into<String>,
        notes: impl Into<String>,
    ) {
        self.log.push(LogEntry::success_with_notes(operation, notes));
        self.metadata.touch();
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
        self.metadata.touch();
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// # Errors
    ///
    /// Fails on malformed JSON or a schema version newer than
    /// [`ProblemType::schema_version`].
    pub fn from_json(json: &str) -> Result<Self> {
        let session: Self = serde_json::from_str(json)?;
        if session.metadata.schema_version > P::schema_version() {
            bail!(
                "session schema version {} is newer than supported version {}",
                session.metadata.schema_version,
                P::schema_version()
            );
        }
        Ok(session)
    }
}

impl<P: ProblemType> Default for PriorSession<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct CountConfig {
        limit: usize,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct CountState {
        partial: Option<usize>,
    }

    #[derive(Debug)]
    struct CountProblem;

    impl ProblemType for CountProblem {
        type Config = CountConfig;
        type Input = Vec<u32>;
        type State = CountState;
        type Output = usize;
        type Export = String;

        fn name() -> &'static str {
            "count"
        }

        fn validate_input(input: &Self::Input) -> Result<()> {
            if input.is_empty() {
                bail!("empty input");
            }
            Ok(())
        }

        fn validate_config(config: &Self::Config) -> Result<()> {
            if config.limit > 100 {
                bail!("limit too large");
            }
            Ok(())
        }

        fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
            Ok(format!("{output} items"))
        }
    }

    #[test]
    fn new_input_clears_computed_results() {
        let mut session = PriorSession::<CountProblem>::new();
        session.set_input(vec![1, 2]).unwrap();
        session.state.partial = Some(2);
        session.set_output(2);

        session.set_input(vec![4]).unwrap();
        assert!(session.state.partial.is_none());
        assert!(!session.has_output());
    }

    #[test]
    fn invalid_input_and_config_are_rejected() {
        let mut session = PriorSession::<CountProblem>::new();
        assert!(session.set_input(Vec::new()).is_err());
        assert!(!session.has_input());
        assert!(session.update_config(|c| c.limit = 1000).is_err());
        assert_eq!(session.config.limit, 0);
    }

    #[test]
    fn export_requires_output() {
        let mut session = PriorSession::<CountProblem>::new();
        assert!(session.export().is_err());
        session.set_output(3);
        assert_eq!(session.export().unwrap(), "3 items");
        assert_eq!(session.exports.len(), 1);
    }

    #[test]
    fn json_roundtrip_and_schema_guard() {
        let mut session = PriorSession::<CountProblem>::new();
        session.set_input(vec![5, 6]).unwrap();
        session.log_success_with_notes("count", "2 items");
        let json = session.to_json().unwrap();
        let back = PriorSession::<CountProblem>::from_json(&json).unwrap();
        assert_eq!(back.input(), Some(&vec![5, 6]));
        assert_eq!(back.log.len(), 1);

        let newer = json.replace("\"schema_version\": 1", "\"schema_version\": 9");
        assert!(PriorSession::<CountProblem>::from_json(&newer).is_err());
    }
}
