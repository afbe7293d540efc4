//! Multi-provider request routing with quota tracking and fallback.
//!
//! For every persona turn the [`ProviderRouter`] walks the persona's affinity chain in order.
//! Candidates that are out of quota, disabled, cooling down after a failure, or whose
//! provider has no registered adapter are skipped. The first remaining candidate gets a quota
//! slot reserved and is called under the per-call timeout; on failure the slot is released,
//! the candidate enters cool-down and the walk continues. When nothing is left the router
//! answers with a degraded response built from the persona's canned replies, so a round
//! always produces a message for every scheduled persona.
//!
//! The router consumes a provider's whole delta stream before returning. The resulting
//! [`Generation`] is a finite, replayable delta sequence, which keeps fallback invisible to
//! the message assembler: it only ever sees the output of the candidate that succeeded.

use crate::roundtable::config::{ProviderAccount, ProviderEndpoint, RoundtableConfig, RouterSettings};
use crate::roundtable::error::ProviderError;
use crate::roundtable::persona::{AffinityTarget, Persona};
use crate::roundtable::provider::{split_into_deltas, GenerationRequest, ProviderAdapter};
use crate::roundtable::providers::OpenAICompatibleProvider;
use crate::roundtable::quota::{AccountKey, Availability, CostEstimate, QuotaLedger, UsageSummary};
use crate::roundtable::store::MessageOrigin;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Output of one persona turn, ready to be replayed into the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    origin: MessageOrigin,
    deltas: Vec<String>,
    failure: Option<ProviderError>,
}

impl Generation {
    pub fn origin(&self) -> &MessageOrigin {
        &self.origin
    }

    /// The delta sequence; iterating it again yields the same output.
    pub fn deltas(&self) -> &[String] {
        &self.deltas
    }

    pub fn text(&self) -> String {
        self.deltas.concat()
    }

    pub fn is_degraded(&self) -> bool {
        self.origin == MessageOrigin::Degraded
    }

    /// `Some(AllProvidersExhausted)` for degraded responses.
    pub fn failure(&self) -> Option<&ProviderError> {
        self.failure.as_ref()
    }
}

/// Why a candidate was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    QuotaExhausted,
    CoolingDown,
    AccountDisabled,
    EndpointDisabled,
    NoAdapter,
    UnknownAccount,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::QuotaExhausted => "quota exhausted",
            SkipReason::CoolingDown => "cooling down",
            SkipReason::AccountDisabled => "account disabled",
            SkipReason::EndpointDisabled => "endpoint disabled",
            SkipReason::NoAdapter => "no adapter registered",
            SkipReason::UnknownAccount => "unknown account",
        };
        f.write_str(label)
    }
}

/// One entry of a routing plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCandidate {
    pub target: AffinityTarget,
    pub skip: Option<SkipReason>,
}

impl PlannedCandidate {
    pub fn is_ready(&self) -> bool {
        self.skip.is_none()
    }
}

/// Resolves persona turns to live backends.
pub struct ProviderRouter {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    endpoints: HashMap<String, ProviderEndpoint>,
    accounts: HashMap<AccountKey, ProviderAccount>,
    ledger: Arc<QuotaLedger>,
    settings: RouterSettings,
    words_per_chunk: usize,
}

impl ProviderRouter {
    /// Builds a router without adapters. Register them with [`with_adapter`](Self::with_adapter)
    /// or [`with_openai_compatible_adapters`](Self::with_openai_compatible_adapters).
    pub fn new(config: &RoundtableConfig, ledger: Arc<QuotaLedger>) -> Self {
        Self {
            adapters: HashMap::new(),
            endpoints: config
                .endpoints
                .iter()
                .map(|e| (e.provider.clone(), e.clone()))
                .collect(),
            accounts: config
                .accounts
                .iter()
                .map(|a| (AccountKey::new(a.provider.clone(), a.account.clone()), a.clone()))
                .collect(),
            ledger,
            settings: config.router.clone(),
            words_per_chunk: config.discussion.words_per_chunk,
        }
    }

    /// Registers `adapter` under its own provider name, replacing any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.name().to_string(), adapter);
        self
    }

    /// Registers an [`OpenAICompatibleProvider`] for every configured endpoint.
    pub fn with_openai_compatible_adapters(mut self) -> Self {
        let timeout = self.settings.call_timeout();
        let endpoints: Vec<ProviderEndpoint> = self.endpoints.values().cloned().collect();
        for endpoint in endpoints {
            let adapter = OpenAICompatibleProvider::new(endpoint).with_request_timeout(timeout);
            self = self.with_adapter(Arc::new(adapter));
        }
        self
    }

    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    /// Ledger usage with endpoint pricing applied. A provider only counts as available when
    /// its endpoint is enabled and an adapter is registered for it.
    pub fn usage_summary(&self) -> UsageSummary {
        let mut summary = self.ledger.usage_summary();
        summary.cost_estimate = CostEstimate::from_usage(&summary.accounts, |provider| {
            self.endpoints
                .get(provider)
                .map_or(0.0, |endpoint| endpoint.cost_per_request)
        });
        for (provider, available) in summary.provider_status.iter_mut() {
            let endpoint_enabled = self.endpoints.get(provider).map_or(true, |e| e.enabled);
            *available &= endpoint_enabled && self.adapters.contains_key(provider);
        }
        summary
    }

    fn skip_reason(&self, target: &AffinityTarget) -> Option<SkipReason> {
        let key = AccountKey::new(target.provider.clone(), target.account.clone());
        if !self.adapters.contains_key(&target.provider) {
            return Some(SkipReason::NoAdapter);
        }
        if let Some(endpoint) = self.endpoints.get(&target.provider) {
            if !endpoint.enabled {
                return Some(SkipReason::EndpointDisabled);
            }
        }
        match self.ledger.availability(&key) {
            Availability::Available => None,
            Availability::Exhausted => Some(SkipReason::QuotaExhausted),
            Availability::CoolingDown => Some(SkipReason::CoolingDown),
            Availability::Disabled => Some(SkipReason::AccountDisabled),
            Availability::Unknown => Some(SkipReason::UnknownAccount),
        }
    }

    /// Classifies every candidate of `chain` against the current ledger state.
    pub fn plan(&self, chain: &[AffinityTarget]) -> Vec<PlannedCandidate> {
        chain
            .iter()
            .map(|target| PlannedCandidate {
                target: target.clone(),
                skip: self.skip_reason(target),
            })
            .collect()
    }

    /// The candidate a generation would try first, if any.
    pub fn select(&self, chain: &[AffinityTarget]) -> Option<AffinityTarget> {
        chain
            .iter()
            .find(|target| self.skip_reason(target).is_none())
            .cloned()
    }

    /// Produces `persona`'s turn, falling back along its affinity chain.
    ///
    /// Never fails: when every candidate is skipped or errors, the result is a degraded
    /// response for (`persona`, `topic`, `round`).
    pub async fn generate(
        &self,
        persona: &Persona,
        request: GenerationRequest,
        topic: &str,
        round: u32,
    ) -> Generation {
        let mut attempts = 0usize;

        for target in &persona.affinity {
            if let Some(max) = self.settings.max_attempts {
                if attempts >= max {
                    log::info!("{}: giving up after {} attempts", persona.id, attempts);
                    break;
                }
            }

            if let Some(reason) = self.skip_reason(target) {
                log::debug!(
                    "{}: skipping {}/{} ({})",
                    persona.id,
                    target.provider,
                    target.account,
                    reason
                );
                continue;
            }

            let key = AccountKey::new(target.provider.clone(), target.account.clone());
            let (Some(adapter), Some(account)) =
                (self.adapters.get(&target.provider), self.accounts.get(&key))
            else {
                continue;
            };
            let permit = match self.ledger.try_reserve(&key) {
                Ok(permit) => permit,
                Err(availability) => {
                    log::debug!("{}: {} lost its slot ({:?})", persona.id, key, availability);
                    continue;
                }
            };
            attempts += 1;

            let mut call = request.clone();
            if target.model.is_some() {
                call.model = target.model.clone();
            }

            let outcome = tokio::time::timeout(
                self.settings.call_timeout(),
                self.collect_deltas(adapter.as_ref(), call, account),
            )
            .await
            .unwrap_or(Err(ProviderError::Timeout));

            match outcome {
                Ok(deltas) => {
                    permit.commit();
                    log::info!("{}: answered by {}", persona.id, key);
                    return Generation {
                        origin: MessageOrigin::Provider {
                            provider: key.provider,
                            account: key.account,
                        },
                        deltas,
                        failure: None,
                    };
                }
                Err(err) => {
                    permit.fail();
                    log::warn!(
                        "{}: {} failed [{}] ({}), trying next provider",
                        persona.id,
                        key,
                        err.label(),
                        err
                    );
                }
            }

            let delay = self.settings.retry_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        log::warn!(
            "{}: all providers failed or quota exceeded, using simulated response",
            persona.id
        );
        self.degraded(persona, topic, round)
    }

    async fn collect_deltas(
        &self,
        adapter: &dyn ProviderAdapter,
        request: GenerationRequest,
        account: &ProviderAccount,
    ) -> Result<Vec<String>, ProviderError> {
        let mut stream = adapter.generate(request, account).await?;
        let mut deltas = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if !chunk.content.is_empty() {
                deltas.push(chunk.content);
            }
            if chunk.is_final {
                break;
            }
        }

        if deltas.iter().all(|d| d.trim().is_empty()) {
            return Err(ProviderError::Unknown("empty response".to_string()));
        }
        if deltas.len() == 1 {
            // a non-streamed answer arrives whole
            let text = deltas.concat();
            return Ok(split_into_deltas(&text, self.words_per_chunk));
        }
        Ok(deltas)
    }

    /// Canned reply for `persona`, identical for identical (persona, topic, round).
    pub fn degraded(&self, persona: &Persona, topic: &str, round: u32) -> Generation {
        let templates = persona.descriptor().simulated_replies;
        let text = if templates.is_empty() {
            format!("I have nothing to add on {} right now.", topic)
        } else {
            let index = (fnv1a(persona.id.key(), topic) as usize + round as usize) % templates.len();
            templates[index].replace("{topic}", topic)
        };
        Generation {
            origin: MessageOrigin::Degraded,
            deltas: split_into_deltas(&text, self.words_per_chunk),
            failure: Some(ProviderError::AllProvidersExhausted),
        }
    }
}

fn fnv1a(persona: &str, topic: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in persona.bytes().chain(std::iter::once(0)).chain(topic.bytes()) {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

impl fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adapters: Vec<&String> = self.adapters.keys().collect();
        adapters.sort();
        f.debug_struct("ProviderRouter")
            .field("adapters", &adapters)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roundtable::clock::SystemClock;
    use crate::roundtable::persona::PersonaId;

    fn router() -> ProviderRouter {
        let config = RoundtableConfig::default();
        let ledger = Arc::new(QuotaLedger::new(
            &config.accounts,
            Arc::new(SystemClock),
            config.router.cooldown(),
        ));
        ProviderRouter::new(&config, ledger)
    }

    #[test]
    fn plan_without_adapters_skips_everything() {
        let router = router();
        let persona = RoundtableConfig::default()
            .persona(PersonaId::Skeptic)
            .cloned()
            .unwrap();
        let plan = router.plan(&persona.affinity);
        assert_eq!(plan.len(), persona.affinity.len());
        assert!(plan.iter().all(|c| c.skip == Some(SkipReason::NoAdapter)));
        assert!(router.select(&persona.affinity).is_none());
    }

    #[test]
    fn degraded_response_is_deterministic() {
        let router = router();
        let persona = Persona::new(PersonaId::Explorer, vec![]);
        let a = router.degraded(&persona, "urban farming", 3);
        let b = router.degraded(&persona, "urban farming", 3);
        assert_eq!(a, b);
        assert!(a.is_degraded());
        assert_eq!(a.failure(), Some(&ProviderError::AllProvidersExhausted));
        assert_eq!(a.deltas().concat(), a.text());
    }

    #[test]
    fn consecutive_rounds_rotate_templates() {
        let router = router();
        let persona = Persona::new(PersonaId::Skeptic, vec![]);
        let r1 = router.degraded(&persona, "t", 1).text();
        let r2 = router.degraded(&persona, "t", 2).text();
        assert_ne!(r1, r2);
    }
}
