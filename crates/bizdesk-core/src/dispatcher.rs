//! Domain dispatcher: decides which domain agent owns an instruction

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::extract;
use crate::types::Domain;

/// Delegation keywords for one domain
#[derive(Debug, Clone, PartialEq)]
pub struct DomainProfile {
    pub domain: Domain,
    pub keywords: Vec<String>,
}

impl DomainProfile {
    pub fn new(domain: Domain, keywords: &[&str]) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for k in keywords {
            let k = k.trim().to_lowercase();
            if !k.is_empty() && !unique.contains(&k) {
                unique.push(k);
            }
        }
        Self {
            domain,
            keywords: unique,
        }
    }

    /// Keywords present in the tokenised instruction
    pub fn matches(&self, tokens: &[String]) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| extract::contains_phrase(tokens, k))
            .cloned()
            .collect()
    }
}

/// How strongly one domain claims an instruction
#[derive(Debug, Clone, Serialize)]
pub struct DomainScore {
    pub domain: Domain,
    pub score: usize,
    pub matched: Vec<String>,
}

/// Classifies instructions by counting each domain's distinct keyword hits
#[derive(Debug, Default)]
pub struct Dispatcher {
    profiles: Vec<DomainProfile>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a domain profile; a second profile for the same domain replaces
    /// the first but keeps its position
    pub fn add_profile(&mut self, profile: DomainProfile) {
        info!(
            "Dispatcher: {} with {} keywords",
            profile.domain,
            profile.keywords.len()
        );
        match self.profiles.iter_mut().find(|p| p.domain == profile.domain) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn profile(&self, domain: Domain) -> Option<&DomainProfile> {
        self.profiles.iter().find(|p| p.domain == domain)
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.profiles.iter().map(|p| p.domain).collect()
    }

    /// Per-domain scores, in declared order
    pub fn scores(&self, text: &str) -> Vec<DomainScore> {
        let tokens = extract::tokenize(text);
        self.profiles
            .iter()
            .map(|p| {
                let matched = p.matches(&tokens);
                DomainScore {
                    domain: p.domain,
                    score: matched.len(),
                    matched,
                }
            })
            .collect()
    }

    /// The single domain with the most keyword hits
    pub fn classify(&self, text: &str) -> CoreResult<Domain> {
        let scores = self.scores(text);
        let top = scores.iter().map(|s| s.score).max().unwrap_or(0);
        if top == 0 {
            debug!("Dispatcher: no domain keywords in '{}'", text);
            return Err(CoreError::NoMatchingDomain);
        }

        let leaders: Vec<Domain> = scores
            .iter()
            .filter(|s| s.score == top)
            .map(|s| s.domain)
            .collect();
        if leaders.len() > 1 {
            debug!("Dispatcher: tie at {} between {:?}", top, leaders);
            return Err(CoreError::AmbiguousDomain {
                candidates: leaders,
            });
        }

        let domain = leaders[0];
        debug!("Dispatcher: routed → {} (score {})", domain, top);
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn dispatcher() -> Dispatcher {
        catalog::default_dispatcher()
    }

    #[test]
    fn test_profile_dedupes_keywords() {
        let p = DomainProfile::new(Domain::Sales, &["Sales", "sales", " revenue "]);
        assert_eq!(p.keywords, vec!["sales", "revenue"]);
    }

    #[test]
    fn test_classify_single_domain() {
        let d = dispatcher();
        assert_eq!(d.classify("What is our cash balance?").unwrap(), Domain::Financial);
        assert_eq!(d.classify("Show stock in the main godown").unwrap(), Domain::Inventory);
        assert_eq!(d.classify("Top suppliers by purchases").unwrap(), Domain::Purchase);
        assert_eq!(d.classify("Who are our best customers").unwrap(), Domain::Sales);
        assert_eq!(
            d.classify("Schedule a meeting tomorrow at 2 PM with jane@x.com and send invitation")
                .unwrap(),
            Domain::Communication
        );
    }

    #[test]
    fn test_classify_tie_lists_domains_in_order() {
        let err = dispatcher()
            .classify("Schedule the invoice review")
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::AmbiguousDomain {
                candidates: vec![Domain::Financial, Domain::Communication]
            }
        );
    }

    #[test]
    fn test_classify_nothing() {
        assert_eq!(
            dispatcher().classify("hello there").unwrap_err(),
            CoreError::NoMatchingDomain
        );
    }

    #[test]
    fn test_distinct_keywords_counted_once() {
        let d = dispatcher();
        let scores = d.scores("cash cash cash");
        let financial = scores.iter().find(|s| s.domain == Domain::Financial).unwrap();
        assert_eq!(financial.score, 1);
    }

    #[test]
    fn test_add_profile_replaces_in_place() {
        let mut d = Dispatcher::new();
        d.add_profile(DomainProfile::new(Domain::Sales, &["sales"]));
        d.add_profile(DomainProfile::new(Domain::Financial, &["cash"]));
        d.add_profile(DomainProfile::new(Domain::Sales, &["revenue"]));
        assert_eq!(d.domains(), vec![Domain::Sales, Domain::Financial]);
        assert_eq!(d.profile(Domain::Sales).unwrap().keywords, vec!["revenue"]);
    }
}
