//! Per-route request handlers.
//!
//! Every action runs the same five stages in order; see [`StagedAction`].
//! The dispatcher only sees the object-safe [`Handler`] face.

pub mod copy_version;
pub mod package_delete;
pub mod package_list;
pub mod package_save;
pub mod version_save;

use std::fmt;

use crate::error::ConsoleResult;
use crate::render::Page;
use crate::request::ActionRequest;
use crate::security::Principal;
use crate::store::EntityStore;

pub use copy_version::CopyPackageVersion;
pub use package_delete::PackageDelete;
pub use package_list::PackageList;
pub use package_save::PackageSave;
pub use version_save::PackageVersionSave;

/// What an action hands back: a page to render, or a redirect that
/// finishes the response without a body.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Page(Page),
    Redirect(String),
}

impl Reply {
    pub fn page(&self) -> Option<&Page> {
        match self {
            Reply::Page(page) => Some(page),
            Reply::Redirect(_) => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Reply::Redirect(target) => Some(target),
            Reply::Page(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ActionSettings {
    /// Where save and delete actions send the browser afterwards.
    pub listing_path: String,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            listing_path: "/p".to_string(),
        }
    }
}

/// Everything an action may touch besides the request itself.
pub struct ActionContext<'a> {
    pub store: &'a dyn EntityStore,
    pub principal: Option<&'a Principal>,
    pub settings: &'a ActionSettings,
}

impl ActionContext<'_> {
    pub fn redirect_to_listing(&self) -> Reply {
        Reply::Redirect(self.settings.listing_path.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionStage {
    ParseInput,
    LoadOrCreate,
    Validate,
    Persist,
    Respond,
}

impl fmt::Display for ActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionStage::ParseInput => "parse_input",
            ActionStage::LoadOrCreate => "load_or_create",
            ActionStage::Validate => "validate",
            ActionStage::Persist => "persist",
            ActionStage::Respond => "respond",
        })
    }
}

/// The capability a route binds to.
pub trait Handler: Send {
    fn name(&self) -> &'static str;

    fn perform(&self, request: &ActionRequest, cx: &ActionContext<'_>) -> ConsoleResult<Reply>;
}

/// An action written as its five stages. Errors end the run at the stage
/// that raised them; nothing after that stage executes.
pub trait StagedAction: Send {
    const NAME: &'static str;

    type Input;
    type Subject;

    fn parse_input(&self, request: &ActionRequest) -> ConsoleResult<Self::Input>;

    fn load_or_create(
        &self,
        input: Self::Input,
        cx: &ActionContext<'_>,
    ) -> ConsoleResult<Self::Subject>;

    fn validate(&self, _subject: &Self::Subject, _cx: &ActionContext<'_>) -> ConsoleResult<()> {
        Ok(())
    }

    fn persist(&self, _subject: &mut Self::Subject, _cx: &ActionContext<'_>) -> ConsoleResult<()> {
        Ok(())
    }

    fn respond(&self, subject: Self::Subject, cx: &ActionContext<'_>) -> ConsoleResult<Reply>;
}

impl<A: StagedAction> Handler for A {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn perform(&self, request: &ActionRequest, cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        let input = run_stage(A::NAME, ActionStage::ParseInput, || self.parse_input(request))?;
        let mut subject = run_stage(A::NAME, ActionStage::LoadOrCreate, || {
            self.load_or_create(input, cx)
        })?;
        run_stage(A::NAME, ActionStage::Validate, || self.validate(&subject, cx))?;
        run_stage(A::NAME, ActionStage::Persist, || {
            self.persist(&mut subject, cx)
        })?;
        run_stage(A::NAME, ActionStage::Respond, || self.respond(subject, cx))
    }
}

fn run_stage<T>(
    action: &'static str,
    stage: ActionStage,
    body: impl FnOnce() -> ConsoleResult<T>,
) -> ConsoleResult<T> {
    tracing::debug!(action, %stage, "action.stage");
    body().inspect_err(|err| {
        tracing::debug!(action, %stage, kind = err.kind(), error = %err, "action.stage.failed");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ConsoleError;
    use crate::store::InMemoryEntityStore;
    use axum::http::Method;

    struct Recorder {
        fail_at: Option<ActionStage>,
        seen: Mutex<Vec<ActionStage>>,
    }

    impl Recorder {
        fn step(&self, stage: ActionStage) -> ConsoleResult<()> {
            self.seen.lock().unwrap().push(stage);
            if self.fail_at == Some(stage) {
                return Err(ConsoleError::bad_request(stage.to_string()));
            }
            Ok(())
        }
    }

    impl StagedAction for Recorder {
        const NAME: &'static str = "recorder";
        type Input = ();
        type Subject = ();

        fn parse_input(&self, _request: &ActionRequest) -> ConsoleResult<()> {
            self.step(ActionStage::ParseInput)
        }

        fn load_or_create(&self, _input: (), _cx: &ActionContext<'_>) -> ConsoleResult<()> {
            self.step(ActionStage::LoadOrCreate)
        }

        fn validate(&self, _subject: &(), _cx: &ActionContext<'_>) -> ConsoleResult<()> {
            self.step(ActionStage::Validate)
        }

        fn persist(&self, _subject: &mut (), _cx: &ActionContext<'_>) -> ConsoleResult<()> {
            self.step(ActionStage::Persist)
        }

        fn respond(&self, _subject: (), cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
            self.step(ActionStage::Respond)?;
            Ok(cx.redirect_to_listing())
        }
    }

    fn run(fail_at: Option<ActionStage>) -> (ConsoleResult<Reply>, Vec<ActionStage>) {
        let recorder = Recorder {
            fail_at,
            seen: Mutex::new(Vec::new()),
        };
        let store = InMemoryEntityStore::new();
        let settings = ActionSettings::default();
        let cx = ActionContext {
            store: &store,
            principal: None,
            settings: &settings,
        };
        let result = recorder.perform(&ActionRequest::new(Method::GET, "/x"), &cx);
        (result, recorder.seen.into_inner().unwrap())
    }

    #[test]
    fn stages_run_in_order() {
        let (result, seen) = run(None);
        assert_eq!(result.unwrap(), Reply::Redirect("/p".into()));
        assert_eq!(
            seen,
            vec![
                ActionStage::ParseInput,
                ActionStage::LoadOrCreate,
                ActionStage::Validate,
                ActionStage::Persist,
                ActionStage::Respond,
            ]
        );
    }

    #[test]
    fn failing_stage_stops_the_run() {
        let (result, seen) = run(Some(ActionStage::Validate));
        assert!(matches!(result, Err(ConsoleError::BadRequest { .. })));
        assert_eq!(seen.last(), Some(&ActionStage::Validate));
        assert!(!seen.contains(&ActionStage::Persist));
    }
}
