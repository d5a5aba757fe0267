//! Mutation hook chains and the call context they run under.
//!
//! Each mutation kind has its own before/after hook list. The interception
//! layer sits at the front of the before-chains; the replay engine re-runs
//! both chains when an approved change is finally applied, so side effects
//! configured by the host survive the approval detour.
//!
//! The call context carries the replay marker. It is an explicit field
//! checked first by the interceptor — not a flag buried in the extra bag —
//! because a replayed mutation that gets re-captured would spawn approval
//! requests forever.

use crate::identity::Identity;
use crate::record::FieldMap;
use crate::request::{MutationKind, RequestId};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Which side of the mutation a hook chain runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Before,
    After,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Before => write!(f, "before"),
            HookStage::After => write!(f, "after"),
        }
    }
}

/// What a hook reports back. An aborting pre-hook stops the chain and its
/// error is surfaced to the caller of the triggering action.
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    pub ok: bool,
    pub error: Option<String>,
    /// A pre-create hook may assign the record id.
    pub new_record_id: Option<String>,
}

impl HookOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            new_record_id: None,
        }
    }

    pub fn abort(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            new_record_id: None,
        }
    }

    pub fn with_new_record_id(mut self, id: impl Into<String>) -> Self {
        self.new_record_id = Some(id.into());
        self
    }
}

/// Call context threaded through every hook invocation.
#[derive(Debug, Clone)]
pub struct MutationContext {
    /// Who triggered the mutation (the requester on capture, the reviewer
    /// on replay).
    pub actor: Identity,
    /// Opaque request metadata (headers etc.) forwarded to hooks.
    pub extra: FieldMap,
    /// Set iff this call is the replay engine applying an approved request.
    pub replay_of: Option<RequestId>,
}

impl MutationContext {
    pub fn new(actor: Identity) -> Self {
        Self {
            actor,
            extra: FieldMap::new(),
            replay_of: None,
        }
    }

    pub fn with_extra(mut self, extra: FieldMap) -> Self {
        self.extra = extra;
        self
    }

    /// Context for applying an approved request.
    pub fn replaying(actor: Identity, request_id: RequestId) -> Self {
        Self {
            actor,
            extra: FieldMap::new(),
            replay_of: Some(request_id),
        }
    }

    pub fn is_replay(&self) -> bool {
        self.replay_of.is_some()
    }
}

/// One mutation hook. `record` is the data being applied for before-hooks
/// and the resulting record for after-hooks (the pre-deletion snapshot for
/// after-delete).
#[async_trait]
pub trait MutationHook: Send + Sync {
    async fn run(&self, ctx: &MutationContext, record: &FieldMap) -> Result<HookOutcome>;
}

/// An ordered list of hooks, run front to back.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn MutationHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn MutationHook>) {
        self.hooks.push(hook);
    }

    /// Insert a hook at the front of the chain.
    pub fn push_front(&mut self, hook: Arc<dyn MutationHook>) {
        self.hooks.insert(0, hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the chain in order. Stops at the first abort and returns that
    /// outcome; otherwise returns ok with the last record id any hook
    /// assigned.
    pub async fn run_all(&self, ctx: &MutationContext, record: &FieldMap) -> Result<HookOutcome> {
        let mut new_record_id = None;
        for hook in &self.hooks {
            let outcome = hook.run(ctx, record).await?;
            if !outcome.ok {
                return Ok(outcome);
            }
            if outcome.new_record_id.is_some() {
                new_record_id = outcome.new_record_id;
            }
        }
        let mut outcome = HookOutcome::ok();
        outcome.new_record_id = new_record_id;
        Ok(outcome)
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookChain({} hooks)", self.hooks.len())
    }
}

/// The before/after chains for all three mutation kinds on one resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceHooks {
    before_create: HookChain,
    after_create: HookChain,
    before_edit: HookChain,
    after_edit: HookChain,
    before_delete: HookChain,
    after_delete: HookChain,
}

impl ResourceHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self, kind: MutationKind, stage: HookStage) -> &HookChain {
        match (kind, stage) {
            (MutationKind::Create, HookStage::Before) => &self.before_create,
            (MutationKind::Create, HookStage::After) => &self.after_create,
            (MutationKind::Edit, HookStage::Before) => &self.before_edit,
            (MutationKind::Edit, HookStage::After) => &self.after_edit,
            (MutationKind::Delete, HookStage::Before) => &self.before_delete,
            (MutationKind::Delete, HookStage::After) => &self.after_delete,
        }
    }

    fn chain_mut(&mut self, kind: MutationKind, stage: HookStage) -> &mut HookChain {
        match (kind, stage) {
            (MutationKind::Create, HookStage::Before) => &mut self.before_create,
            (MutationKind::Create, HookStage::After) => &mut self.after_create,
            (MutationKind::Edit, HookStage::Before) => &mut self.before_edit,
            (MutationKind::Edit, HookStage::After) => &mut self.after_edit,
            (MutationKind::Delete, HookStage::Before) => &mut self.before_delete,
            (MutationKind::Delete, HookStage::After) => &mut self.after_delete,
        }
    }

    pub fn push(&mut self, kind: MutationKind, stage: HookStage, hook: Arc<dyn MutationHook>) {
        self.chain_mut(kind, stage).push(hook);
    }

    /// Insert a hook at the front of a chain. The interceptor installs
    /// itself this way so it runs before any host hook.
    pub fn push_front(
        &mut self,
        kind: MutationKind,
        stage: HookStage,
        hook: Arc<dyn MutationHook>,
    ) {
        self.chain_mut(kind, stage).push_front(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl MutationHook for Counting {
        async fn run(&self, _ctx: &MutationContext, _record: &FieldMap) -> Result<HookOutcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(HookOutcome::ok())
        }
    }

    struct Aborting;

    #[async_trait]
    impl MutationHook for Aborting {
        async fn run(&self, _ctx: &MutationContext, _record: &FieldMap) -> Result<HookOutcome> {
            Ok(HookOutcome::abort("no thanks"))
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_and_stops_at_abort() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut chain = HookChain::new();
        chain.push(Arc::new(Counting(count.clone())));
        chain.push(Arc::new(Aborting));
        chain.push(Arc::new(Counting(count.clone())));

        let ctx = MutationContext::new(Identity::new("u1", "alice"));
        let outcome = chain.run_all(&ctx, &FieldMap::new()).await.unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("no thanks"));
        // The hook after the abort never ran.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_push_front_runs_first() {
        struct AssignId;

        #[async_trait]
        impl MutationHook for AssignId {
            async fn run(
                &self,
                _ctx: &MutationContext,
                _record: &FieldMap,
            ) -> Result<HookOutcome> {
                Ok(HookOutcome::ok().with_new_record_id("assigned-1"))
            }
        }

        let mut hooks = ResourceHooks::new();
        hooks.push(MutationKind::Create, HookStage::Before, Arc::new(AssignId));
        hooks.push_front(MutationKind::Create, HookStage::Before, Arc::new(Aborting));

        let ctx = MutationContext::new(Identity::new("u1", "alice"));
        let outcome = hooks
            .chain(MutationKind::Create, HookStage::Before)
            .run_all(&ctx, &FieldMap::new())
            .await
            .unwrap();
        assert!(!outcome.ok, "front hook aborts before AssignId runs");
    }

    #[test]
    fn test_replay_marker() {
        let ctx = MutationContext::replaying(Identity::new("u2", "bob"), RequestId::new());
        assert!(ctx.is_replay());
        assert!(!MutationContext::new(Identity::new("u1", "alice")).is_replay());
    }
}
