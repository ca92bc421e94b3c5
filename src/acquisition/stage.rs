/// What the pipeline does when a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run and surface the error
    Abort,

    /// Log a warning and leave the stage's fields at their defaults
    Degrade,

    /// Log a warning and skip every stage that needs the local clone
    ApiOnly,
}

/// The ordered stages of an acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Stage {
    #[strum(to_string = "parse repository reference")]
    ParseReference,
    #[strum(to_string = "fetch metadata")]
    FetchMetadata,
    #[strum(to_string = "fetch commit activity")]
    FetchCommitActivity,
    #[strum(to_string = "fetch contributors")]
    FetchContributors,
    #[strum(to_string = "fetch language breakdown")]
    FetchLanguages,
    #[strum(to_string = "fetch README")]
    FetchReadme,
    #[strum(to_string = "check security files")]
    CheckSecurity,
    #[strum(to_string = "clone repository")]
    CloneRepository,
    #[strum(to_string = "analyze git history")]
    AnalyzeHistory,
    #[strum(to_string = "count file extensions")]
    CountExtensions,
    #[strum(to_string = "sample source files")]
    SampleFiles,
    #[strum(to_string = "extract dependencies")]
    ExtractDependencies,
    #[strum(to_string = "clean up clone")]
    Cleanup,
}

impl Stage {
    /// Position of the stage in the run, as shown in logs
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ParseReference => "1",
            Self::FetchMetadata => "2",
            Self::FetchCommitActivity => "3",
            Self::FetchContributors => "4",
            Self::FetchLanguages => "5",
            Self::FetchReadme => "6",
            Self::CheckSecurity => "7",
            Self::CloneRepository => "8",
            Self::AnalyzeHistory => "8a",
            Self::CountExtensions => "9",
            Self::SampleFiles => "10",
            Self::ExtractDependencies => "11",
            Self::Cleanup => "12",
        }
    }

    #[must_use]
    pub const fn policy(self) -> FailurePolicy {
        match self {
            Self::ParseReference | Self::FetchMetadata => FailurePolicy::Abort,
            Self::CloneRepository => FailurePolicy::ApiOnly,
            _ => FailurePolicy::Degrade,
        }
    }

    /// What the dataset falls back to when the stage fails
    #[must_use]
    pub const fn fallback(self) -> &'static str {
        match self {
            Self::ParseReference | Self::FetchMetadata => "aborting",
            Self::FetchCommitActivity => "continuing without commit activity",
            Self::FetchContributors => "continuing without a contributor count",
            Self::FetchLanguages => "continuing without a language breakdown",
            Self::FetchReadme => "continuing without the README",
            Self::CheckSecurity => "continuing without security file checks",
            Self::CloneRepository => "switching to API-only mode",
            Self::AnalyzeHistory => "keeping API-derived commit data",
            Self::CountExtensions => "continuing without extension counts",
            Self::SampleFiles => "continuing without code samples",
            Self::ExtractDependencies => "continuing without dependencies",
            Self::Cleanup => "the temporary clone may need to be removed by hand",
        }
    }

    /// Whether the stage runs against the local clone
    #[must_use]
    pub const fn needs_clone(self) -> bool {
        matches!(
            self,
            Self::AnalyzeHistory | Self::CountExtensions | Self::SampleFiles | Self::ExtractDependencies | Self::Cleanup
        )
    }
}
