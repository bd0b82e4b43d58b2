// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The stage protocol: what a registered transformation looks like.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use kiln_core::{AssetValue, SourceKind, TypeTag};
use std::{collections::BTreeSet, fmt, future::Future, sync::Arc};

/// Decides which inputs a stage accepts.
///
/// Exactly one matcher kind is active per stage. When several stages accept
/// the same input, an exact type match is preferred over an extension match,
/// which is preferred over the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputMatcher {
    /// Accepts values already produced under this tag.
    Type(TypeTag),
    /// Accepts raw bytes whose extension (or media type) is in the set.
    Extensions(BTreeSet<String>),
    /// Accepts any input.
    Any,
}

impl InputMatcher {
    /// Matches values of the given type.
    pub fn of_type(tag: impl Into<TypeTag>) -> Self {
        InputMatcher::Type(tag.into())
    }

    /// Matches raw sources with any of the given extensions.
    ///
    /// Entries are lowercased; a leading `.` is added to plain extensions
    /// (`"obj"` becomes `".obj"`) while media types such as `image/png` are
    /// kept as they are.
    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        InputMatcher::Extensions(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        )
    }

    /// Returns `true` if the matcher accepts `input`.
    pub fn accepts(&self, input: &SourceKind) -> bool {
        match (self, input) {
            (InputMatcher::Any, _) => true,
            (InputMatcher::Type(tag), SourceKind::Typed(input)) => tag == input,
            (InputMatcher::Extensions(set), SourceKind::Extension(ext)) => set.contains(ext),
            _ => false,
        }
    }

    /// Rank used to order candidates: lower is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            InputMatcher::Type(_) => 0,
            InputMatcher::Extensions(_) => 1,
            InputMatcher::Any => 2,
        }
    }
}

impl fmt::Display for InputMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMatcher::Type(tag) => write!(f, "type '{tag}'"),
            InputMatcher::Extensions(set) => {
                let list: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "extensions {{{}}}", list.join(", "))
            }
            InputMatcher::Any => write!(f, "any input"),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') || ext.contains('/') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// The work a stage performs on the value handed to it.
///
/// Handlers must be free of ambient state: everything they need arrives
/// through the [`ExecutionContext`], so one handler can serve any number of
/// concurrent chains.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Transforms `ctx.input()` into the stage's output.
    async fn handle(&self, ctx: ExecutionContext) -> anyhow::Result<AssetValue>;
}

/// A [`StageHandler`] built from an async closure. See [`stage_fn`].
pub struct FnStage<F>(F);

#[async_trait]
impl<F, Fut> StageHandler for FnStage<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<AssetValue>> + Send + 'static,
{
    async fn handle(&self, ctx: ExecutionContext) -> anyhow::Result<AssetValue> {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a stage handler.
///
/// ```
/// use kiln_core::AssetValue;
/// use kiln_lanes::stage_fn;
///
/// let handler = stage_fn(|ctx| async move {
///     let len = ctx.raw()?.len();
///     anyhow::Ok(AssetValue::new(len))
/// });
/// # let _ = handler;
/// ```
pub fn stage_fn<F, Fut>(f: F) -> FnStage<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<AssetValue>> + Send + 'static,
{
    FnStage(f)
}

/// A registered transformation from one input kind to one output type.
///
/// Immutable once registered; the registry hands out shared references.
#[derive(Clone)]
pub struct StageDescriptor {
    pub(crate) id: usize,
    label: Arc<str>,
    matcher: InputMatcher,
    output: TypeTag,
    handler: Arc<dyn StageHandler>,
}

impl StageDescriptor {
    /// Describes a stage. `label` only shows up in logs and errors.
    pub fn new(
        label: impl AsRef<str>,
        matcher: InputMatcher,
        output: impl Into<TypeTag>,
        handler: impl StageHandler + 'static,
    ) -> Self {
        Self::from_arc(label, matcher, output, Arc::new(handler))
    }

    /// Like [`StageDescriptor::new`] for a handler that is already shared.
    pub fn from_arc(
        label: impl AsRef<str>,
        matcher: InputMatcher,
        output: impl Into<TypeTag>,
        handler: Arc<dyn StageHandler>,
    ) -> Self {
        Self {
            id: 0,
            label: Arc::from(label.as_ref()),
            matcher,
            output: output.into(),
            handler,
        }
    }

    /// Position in the registry, which is also its registration order.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Human readable name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// What the stage accepts.
    pub fn matcher(&self) -> &InputMatcher {
        &self.matcher
    }

    /// What the stage produces.
    pub fn output(&self) -> &TypeTag {
        &self.output
    }

    /// The handler invoked when the stage runs.
    pub fn handler(&self) -> &Arc<dyn StageHandler> {
        &self.handler
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("matcher", &self.matcher)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions_are_normalized() {
        let matcher = InputMatcher::extensions(["OBJ", ".Mtl", "image/PNG"]);
        assert!(matcher.accepts(&SourceKind::Extension(".obj".into())));
        assert!(matcher.accepts(&SourceKind::Extension(".mtl".into())));
        assert!(matcher.accepts(&SourceKind::Extension("image/png".into())));
        assert!(!matcher.accepts(&SourceKind::Extension(".png".into())));
    }

    #[test]
    fn test_kinds_do_not_cross() {
        let by_type = InputMatcher::of_type("Model");
        let by_ext = InputMatcher::extensions([".model"]);
        assert!(!by_type.accepts(&SourceKind::Extension("Model".into())));
        assert!(!by_ext.accepts(&SourceKind::Typed(TypeTag::new(".model"))));
        assert!(InputMatcher::Any.accepts(&SourceKind::Typed(TypeTag::new("Model"))));
        assert!(InputMatcher::Any.accepts(&SourceKind::Extension(String::new())));
    }

    #[test]
    fn test_specificity_order() {
        assert!(
            InputMatcher::of_type("A").specificity()
                < InputMatcher::extensions(["a"]).specificity()
        );
        assert!(InputMatcher::extensions(["a"]).specificity() < InputMatcher::Any.specificity());
    }

    #[test]
    fn test_equal_extension_sets_compare_equal() {
        assert_eq!(
            InputMatcher::extensions(["a", "b"]),
            InputMatcher::extensions([".B", ".a"])
        );
    }
}
