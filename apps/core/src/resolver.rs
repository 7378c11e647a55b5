use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binding_store::BindingStore;
use crate::candidate_directory::CandidateDirectory;
use crate::model::{normalize_routing_key, HandlerBinding, HandlerCandidate, Owner};
use crate::request::{Request, RequestKind};
use crate::special_type::SpecialType;
use crate::store::Store;

/// A concrete handler call: the plugin to run and the argument vector it receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub owner_id: String,
    pub candidate_id: String,
    pub command_template: String,
    /// `args[0]` is the substituted template, followed by the raw request arguments.
    pub args: Vec<String>,
}

impl Invocation {
    pub fn from_template(
        owner_id: &str,
        candidate_id: &str,
        command_template: &str,
        request: &Request,
    ) -> Self {
        let mut args = Vec::with_capacity(request.arguments.len() + 1);
        args.push(substitute_placeholders(command_template, &request.arguments));
        args.extend(request.arguments.iter().cloned());
        Self {
            owner_id: owner_id.to_string(),
            candidate_id: candidate_id.to_string(),
            command_template: command_template.to_string(),
            args,
        }
    }
}

/// Candidates the user has to choose between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub new_candidates: Vec<HandlerCandidate>,
    pub existing_candidates: Vec<HandlerCandidate>,
    pub request: Request,
    /// Key the candidates were listed under; a special-type key for some file requests.
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Dispatch(Invocation),
    NeedsSelection(Selection),
    Fallback(Request),
}

impl Outcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Decides which handler services a request, reading and updating bindings.
#[derive(Debug, Clone)]
pub struct Resolver {
    bindings: BindingStore,
    candidates: CandidateDirectory,
}

impl Resolver {
    pub fn new(store: &Store) -> Self {
        Self {
            bindings: BindingStore::new(store.clone()),
            candidates: CandidateDirectory::new(store.clone()),
        }
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn candidates(&self) -> &CandidateDirectory {
        &self.candidates
    }

    pub async fn resolve(&self, request: &Request) -> Outcome {
        if !request.is_routable() {
            debug!(input = %request.raw_input, "request has no routing key");
            return Outcome::Fallback(request.clone());
        }

        if request.kind == RequestKind::FileType {
            if let Some(special) = request.extension().and_then(SpecialType::for_extension) {
                let outcome = self.resolve_key(special.as_str(), request).await;
                if !outcome.is_fallback() {
                    return outcome;
                }
                debug!(
                    special = special.as_str(),
                    routing_key = %request.routing_key,
                    "no special-type handler; trying extension"
                );
            }
        }

        self.resolve_key(&request.routing_key, request).await
    }

    /// Applies a chooser answer. Without `remember` any existing binding is
    /// cleared so a one-off choice never becomes sticky.
    pub async fn apply_selection(
        &self,
        selected: &HandlerCandidate,
        request: &Request,
        remember: bool,
    ) -> Outcome {
        let routing_key = if selected.routing_key.is_empty() {
            normalize_routing_key(&request.routing_key)
        } else {
            selected.routing_key.clone()
        };

        if remember {
            info!(routing_key, owner = %selected.owner, "remembering handler choice");
            if let Err(error) = self
                .bindings
                .upsert(&routing_key, &selected.candidate_id, &selected.owner)
                .await
            {
                warn!(routing_key, %error, "failed to persist handler choice");
            }
        } else {
            info!(routing_key, owner = %selected.owner, "one-off handler choice; clearing binding");
            if let Err(error) = self.bindings.remove(&routing_key).await {
                warn!(routing_key, %error, "failed to clear binding");
            }
        }

        outcome_for(selected, request)
    }

    async fn resolve_key(&self, routing_key: &str, request: &Request) -> Outcome {
        let routing_key = normalize_routing_key(routing_key);
        let binding = self.bindings.lookup(&routing_key).await;

        if let Some(binding) = &binding {
            if binding.owner.is_system() {
                info!(routing_key, "bound to system handler");
                return Outcome::Fallback(request.clone());
            }
        }

        let candidates = match self.candidates.list(&routing_key).await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(routing_key, %error, "candidate listing failed; treating key as unregistered");
                Vec::new()
            }
        };

        if let Some(binding) = binding {
            match self
                .resolve_bound(&routing_key, &binding, candidates.clone(), request)
                .await
            {
                Some(outcome) => return outcome,
                None => warn!(
                    routing_key,
                    candidate_id = %binding.candidate_id,
                    "bound candidate is no longer registered; resolving as unbound"
                ),
            }
        }

        self.resolve_unbound(&routing_key, candidates, request).await
    }

    async fn resolve_bound(
        &self,
        routing_key: &str,
        binding: &HandlerBinding,
        candidates: Vec<HandlerCandidate>,
        request: &Request,
    ) -> Option<Outcome> {
        let bound = candidates
            .iter()
            .find(|candidate| candidate.candidate_id == binding.candidate_id)
            .cloned();

        let (newer, rest): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|candidate| candidate.updated_at > binding.last_checked_at);

        if !newer.is_empty() {
            // Only a different candidate id counts as a new handler; a reinstall
            // that mints a fresh id is therefore indistinguishable from one.
            let newcomers: Vec<_> = newer
                .into_iter()
                .filter(|candidate| candidate.candidate_id != binding.candidate_id)
                .collect();

            if !newcomers.is_empty() {
                info!(
                    routing_key,
                    newcomers = newcomers.len(),
                    "newer handlers registered since binding was checked"
                );
                return Some(Outcome::NeedsSelection(Selection {
                    new_candidates: newcomers,
                    existing_candidates: rest,
                    request: request.clone(),
                    routing_key: routing_key.to_string(),
                }));
            }

            debug!(routing_key, "bound handler re-registered; refreshing check time");
            if let Err(error) = self.bindings.touch(routing_key).await {
                warn!(routing_key, %error, "failed to refresh binding check time");
            }
        }

        let bound = bound?;
        debug!(routing_key, owner = %bound.owner, "reusing bound handler");
        Some(outcome_for(&bound, request))
    }

    async fn resolve_unbound(
        &self,
        routing_key: &str,
        mut candidates: Vec<HandlerCandidate>,
        request: &Request,
    ) -> Outcome {
        match candidates.len() {
            0 => {
                debug!(routing_key, "no registered handler");
                Outcome::Fallback(request.clone())
            }
            1 => {
                let only = candidates.remove(0);
                info!(routing_key, owner = %only.owner, "auto-binding sole handler");
                if let Err(error) = self
                    .bindings
                    .upsert(routing_key, &only.candidate_id, &only.owner)
                    .await
                {
                    warn!(routing_key, %error, "failed to auto-bind handler");
                }
                outcome_for(&only, request)
            }
            count => {
                info!(routing_key, count, "multiple handlers; selection required");
                Outcome::NeedsSelection(Selection {
                    new_candidates: candidates,
                    existing_candidates: Vec::new(),
                    request: request.clone(),
                    routing_key: routing_key.to_string(),
                })
            }
        }
    }
}

fn outcome_for(candidate: &HandlerCandidate, request: &Request) -> Outcome {
    match &candidate.owner {
        Owner::Plugin(owner_id) => Outcome::Dispatch(Invocation::from_template(
            owner_id,
            &candidate.candidate_id,
            &candidate.command_template,
            request,
        )),
        Owner::System => Outcome::Fallback(request.clone()),
    }
}

/// Replaces `%N` with `arguments[N]`; placeholders without an argument stay verbatim.
pub fn substitute_placeholders(template: &str, arguments: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }

        let mut end = start + 1;
        while let Some(&(index, digit)) = chars.peek() {
            if !digit.is_ascii_digit() {
                break;
            }
            end = index + 1;
            chars.next();
        }

        let digits = &template[start + 1..end];
        match digits.parse::<usize>().ok().and_then(|i| arguments.get(i)) {
            Some(value) => out.push_str(value),
            None => out.push_str(&template[start..end]),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::substitute_placeholders;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn substitutes_positional_placeholders() {
        assert_eq!(
            substitute_placeholders("open %0 --line %1", &args(&["a.txt", "12"])),
            "open a.txt --line 12"
        );
    }

    #[test]
    fn keeps_placeholders_without_arguments() {
        assert_eq!(substitute_placeholders("run %0 %3 %", &args(&["x"])), "run x %3 %");
    }

    #[test]
    fn multi_digit_placeholders_are_not_split() {
        let many: Vec<String> = (0..11).map(|i| format!("v{i}")).collect();
        assert_eq!(substitute_placeholders("%1|%10", &many), "v1|v10");
        assert_eq!(substitute_placeholders("%10", &args(&["a", "b"])), "%10");
    }
}
