//! Engine configuration.
//!
//! [`RoundtableConfig`] gathers everything a deployment decides: round limits, context sizes,
//! router timing, provider endpoints, credentialed accounts and the persona roster with each
//! persona's affinity chain. The [`Default`] value mirrors a production setup with five
//! rotating Google AI Studio accounts and three secondary providers that are configured but
//! disabled until keys are supplied.
//!
//! ```
//! use roundtable::config::RoundtableConfig;
//!
//! let config = RoundtableConfig::default()
//!     .with_max_rounds(4)
//!     .with_responders_per_round(3);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.discussion.max_rounds, 4);
//! ```

use crate::roundtable::error::ConfigError;
use crate::roundtable::persona::{AffinityTarget, Persona, PersonaId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub const GOOGLE_AI_STUDIO: &str = "google_ai_studio";
pub const GROQ: &str = "groq";
pub const OPENROUTER: &str = "openrouter";
pub const CEREBRAS: &str = "cerebras";

/// Round and context limits of a discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionSettings {
    pub max_rounds: u32,
    /// K: how many personas speak per round.
    pub responders_per_round: usize,
    /// Non-system messages included in a persona's prompt context.
    pub context_messages: usize,
    /// Of those, how many are quoted verbatim.
    pub quoted_messages: usize,
    /// Word group size when a whole text is replayed as deltas.
    pub words_per_chunk: usize,
}

impl Default for DiscussionSettings {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            responders_per_round: 2,
            context_messages: 5,
            quoted_messages: 3,
            words_per_chunk: 4,
        }
    }
}

/// Timing knobs of the provider router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub call_timeout_ms: u64,
    /// A candidate that failed is skipped for this long.
    pub cooldown_ms: u64,
    /// Pause between a failed candidate and the next one.
    pub retry_delay_ms: u64,
    /// Upper bound on candidates actually called per generation. `None` walks the whole chain.
    pub max_attempts: Option<usize>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            cooldown_ms: 60_000,
            retry_delay_ms: 0,
            max_attempts: None,
        }
    }
}

impl RouterSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Where and how to reach a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub provider: String,
    /// Base URL ending in `/`; request paths are appended to it.
    pub base_url: String,
    pub model: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Price of one call in USD; zero on free tiers.
    #[serde(default)]
    pub cost_per_request: f64,
}

impl ProviderEndpoint {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            model: model.into(),
            enabled: true,
            cost_per_request: 0.0,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_cost_per_request(mut self, cost: f64) -> Self {
        self.cost_per_request = cost;
        self
    }
}

/// One credentialed account of a provider with its own daily allowance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub provider: String,
    pub account: String,
    pub daily_quota: u32,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl ProviderAccount {
    pub fn new(provider: impl Into<String>, account: impl Into<String>, daily_quota: u32) -> Self {
        Self {
            provider: provider.into(),
            account: account.into(),
            daily_quota,
            api_key_env: None,
            enabled: true,
        }
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Reads the credential from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundtableConfig {
    pub discussion: DiscussionSettings,
    pub router: RouterSettings,
    pub endpoints: Vec<ProviderEndpoint>,
    pub accounts: Vec<ProviderAccount>,
    pub personas: Vec<Persona>,
}

const GOOGLE_ACCOUNTS: [(&str, &str); 5] = [
    ("primary_account", "GOOGLE_AI_STUDIO_KEY_1"),
    ("secondary_account", "GOOGLE_AI_STUDIO_KEY_2"),
    ("tertiary_account", "GOOGLE_AI_STUDIO_KEY_3"),
    ("quaternary_account", "GOOGLE_AI_STUDIO_KEY_4"),
    ("pro_account", "GOOGLE_AI_STUDIO_PRO_KEY"),
];

impl Default for RoundtableConfig {
    fn default() -> Self {
        let endpoints = vec![
            ProviderEndpoint::new(
                GOOGLE_AI_STUDIO,
                "https://generativelanguage.googleapis.com/v1beta/openai/",
                "gemini-1.5-flash",
            ),
            ProviderEndpoint::new(
                GROQ,
                "https://api.groq.com/openai/v1/",
                "llama-3.1-70b-versatile",
            )
            .disabled(),
            ProviderEndpoint::new(
                OPENROUTER,
                "https://openrouter.ai/api/v1/",
                "meta-llama/llama-3.1-8b-instruct:free",
            )
            .disabled(),
            ProviderEndpoint::new(CEREBRAS, "https://api.cerebras.ai/v1/", "llama3.1-70b")
                .disabled(),
        ];

        let mut accounts: Vec<ProviderAccount> = GOOGLE_ACCOUNTS
            .iter()
            .map(|(account, env)| {
                ProviderAccount::new(GOOGLE_AI_STUDIO, *account, 1500).with_api_key_env(*env)
            })
            .collect();
        accounts.push(ProviderAccount::new(GROQ, "default", 6000).with_api_key_env("GROQ_API_KEY"));
        accounts.push(
            ProviderAccount::new(OPENROUTER, "default", 50).with_api_key_env("OPENROUTER_API_KEY"),
        );
        accounts.push(
            ProviderAccount::new(CEREBRAS, "default", 30).with_api_key_env("CEREBRAS_API_KEY"),
        );

        let personas = PersonaId::ALL
            .iter()
            .map(|id| Persona::new(*id, default_affinity(*id)))
            .collect();

        Self {
            discussion: DiscussionSettings::default(),
            router: RouterSettings::default(),
            endpoints,
            accounts,
            personas,
        }
    }
}

/// Each persona starts on a different Google account so the daily allowances drain evenly,
/// then rotates through the rest before falling back to the secondary providers.
fn default_affinity(id: PersonaId) -> Vec<AffinityTarget> {
    let offset = PersonaId::ALL.iter().position(|p| *p == id).unwrap_or(0);
    let model = match id {
        PersonaId::Synthesizer | PersonaId::Analyst => Some("gemini-1.5-pro"),
        PersonaId::Skeptic | PersonaId::Explorer => None,
    };

    let mut chain: Vec<AffinityTarget> = (0..GOOGLE_ACCOUNTS.len())
        .map(|i| {
            let (account, _) = GOOGLE_ACCOUNTS[(offset + i) % GOOGLE_ACCOUNTS.len()];
            let target = AffinityTarget::new(GOOGLE_AI_STUDIO, account);
            match model {
                Some(m) => target.with_model(m),
                None => target,
            }
        })
        .collect();
    for provider in [GROQ, OPENROUTER, CEREBRAS] {
        chain.push(AffinityTarget::new(provider, "default"));
    }
    chain
}

impl RoundtableConfig {
    /// Parses a JSON document. Missing sections fall back to their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: RoundtableConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.discussion.max_rounds = max_rounds;
        self
    }

    pub fn with_responders_per_round(mut self, k: usize) -> Self {
        self.discussion.responders_per_round = k;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.router.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.router.cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.router.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.router.max_attempts = Some(attempts);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Vec<ProviderEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<ProviderAccount>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_personas(mut self, personas: Vec<Persona>) -> Self {
        self.personas = personas;
        self
    }

    pub fn endpoint(&self, provider: &str) -> Option<&ProviderEndpoint> {
        self.endpoints.iter().find(|e| e.provider == provider)
    }

    pub fn account(&self, provider: &str, account: &str) -> Option<&ProviderAccount> {
        self.accounts
            .iter()
            .find(|a| a.provider == provider && a.account == account)
    }

    pub fn persona(&self, id: PersonaId) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Checks the roster and the account references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.personas.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        if self.discussion.responders_per_round == 0 {
            return Err(ConfigError::ZeroResponders);
        }

        let mut seen_accounts = HashSet::new();
        for account in &self.accounts {
            let key = format!("{}/{}", account.provider, account.account);
            if !seen_accounts.insert(key.clone()) {
                return Err(ConfigError::DuplicateAccount(key));
            }
        }

        let mut seen_personas = HashSet::new();
        for persona in &self.personas {
            if !seen_personas.insert(persona.id) {
                return Err(ConfigError::DuplicatePersona(persona.id.to_string()));
            }
            for target in &persona.affinity {
                if self.account(&target.provider, &target.account).is_none() {
                    return Err(ConfigError::UnknownTarget(format!(
                        "{}/{}",
                        target.provider, target.account
                    )));
                }
            }
        }
        Ok(())
    }
}
