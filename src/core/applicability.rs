use serde::Serialize;

/// Whether a demand flexibility measure may be applied to something.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum ApplicabilityOutcome {
    Applicable,
    NotApplicable { reason: String },
}

impl ApplicabilityOutcome {
    pub fn is_applicable(&self) -> bool {
        matches!(self, ApplicabilityOutcome::Applicable)
    }
}

type Predicate<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// An ordered list of named checks, evaluated until the first one fails.
pub struct Applicability<T> {
    checks: Vec<(String, Predicate<T>)>,
}

impl<T> Default for Applicability<T> {
    fn default() -> Self {
        Self { checks: vec![] }
    }
}

impl<T> Applicability<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a check; a failing check explains itself through its error message.
    pub fn with_check(
        mut self,
        name: &str,
        check: impl Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.checks.push((name.to_string(), Box::new(check)));
        self
    }

    pub fn evaluate(&self, subject: &T) -> ApplicabilityOutcome {
        self.checks
            .iter()
            .find_map(|(name, check)| check(subject).err().map(|reason| (name, reason)))
            .map_or(ApplicabilityOutcome::Applicable, |(name, reason)| {
                ApplicabilityOutcome::NotApplicable {
                    reason: format!("{name}: {reason}"),
                }
            })
    }
}

impl<T> std::fmt::Debug for Applicability<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.checks.iter().map(|(name, _)| name))
            .finish()
    }
}
