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

use anyhow::Result;
use futures::future::join_all;
use kiln_agents::{AssetManager, EntryState};
use kiln_core::{Asset, AssetValue, LoadError, SourceKind};
use kiln_io::MemorySource;
use kiln_lanes::{stage_fn, InputMatcher, StageDescriptor};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

// --- Test Setup: assets and stages ---
#[derive(Debug, PartialEq)]
struct Widget {
    text: String,
}
impl Asset for Widget {
    const TYPE_NAME: &'static str = "Widget";
}

#[derive(Debug)]
struct Texture {
    size: usize,
}
impl Asset for Texture {
    const TYPE_NAME: &'static str = "Texture";
}

struct SceneAsset {
    textures: Vec<AssetValue>,
}
impl Asset for SceneAsset {
    const TYPE_NAME: &'static str = "SceneAsset";
}

/// `.foo` bytes -> "Raw" (a String), counting how often it runs.
fn raw_stage(runs: Arc<AtomicUsize>) -> StageDescriptor {
    StageDescriptor::new(
        "foo-to-raw",
        InputMatcher::extensions(["foo"]),
        "Raw",
        stage_fn(move |ctx| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                let text = ctx.raw()?.text()?.to_string();
                anyhow::Ok(AssetValue::new(text))
            }
        }),
    )
}

/// "Raw" -> Widget.
fn widget_stage() -> StageDescriptor {
    StageDescriptor::new(
        "raw-to-widget",
        InputMatcher::of_type("Raw"),
        "Widget",
        stage_fn(|ctx| async move {
            let text = ctx.input_as::<String>()?;
            anyhow::Ok(AssetValue::new(Widget {
                text: text.to_uppercase(),
            }))
        }),
    )
}

fn widget_manager(memory: Arc<MemorySource>, runs: Arc<AtomicUsize>) -> Result<AssetManager> {
    Ok(AssetManager::builder()
        .shared_source(memory)
        .stage(raw_stage(runs))?
        .stage(widget_stage())?
        .build())
}
// ---

#[tokio::test]
async fn test_simple_chain() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.foo", "hello")?;
    let manager = widget_manager(memory, Arc::default())?;

    let widget = manager.load_as::<Widget>("x.foo").await?;
    assert_eq!(widget.text, "HELLO");

    let stats = manager.stats();
    assert_eq!(stats.chains_started, 1);
    assert_eq!(stats.stages_executed, 2);
    assert_eq!(
        manager.entry_state("/x.foo", "Widget"),
        Some(EntryState::Resolved)
    );
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_share_one_chain() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.foo", "shared")?;
    let runs = Arc::new(AtomicUsize::new(0));
    let manager = widget_manager(memory.clone(), runs.clone())?;

    let loads: Vec<_> = (0..16)
        .map(|i| {
            // Spelled differently, same normalized key.
            let locator = if i % 2 == 0 { "/x.foo" } else { "./x.foo" };
            manager.load(locator, "Widget")
        })
        .collect();
    let results = join_all(loads).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(memory.fetch_count(), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert!(result.as_ref().unwrap().ptr_eq(first));
    }

    let stats = manager.stats();
    assert_eq!(stats.requests, 16);
    assert_eq!(stats.chains_started, 1);
    assert_eq!(stats.coalesced + stats.cache_hits, 15);
    Ok(())
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_the_chain() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.foo", "kept")?;
    let runs = Arc::new(AtomicUsize::new(0));
    let manager = widget_manager(memory, runs.clone())?;

    drop(manager.load("/x.foo", "Widget"));
    let widget = manager.load_as::<Widget>("/x.foo").await?;

    assert_eq!(widget.text, "KEPT");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(manager.stats().chains_started, 1);
    Ok(())
}

#[tokio::test]
async fn test_shared_dependency_loads_once() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/textures/wood.png", vec![0u8; 4])?;
    memory.insert("/textures/stone.png", vec![0u8; 9])?;
    memory.insert("/scenes/a.scene", "../textures/wood.png")?;
    memory.insert("/scenes/b.scene", "../textures/wood.png\n../textures/stone.png")?;

    let texture_loads = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = texture_loads.clone();

    let manager = AssetManager::builder()
        .shared_source(memory)
        .stage(StageDescriptor::new(
            "png",
            InputMatcher::extensions(["png"]),
            "Texture",
            stage_fn(move |ctx| {
                seen.lock().unwrap().push(ctx.locator().to_string());
                async move {
                    let size = ctx.raw()?.len();
                    anyhow::Ok(AssetValue::new(Texture { size }))
                }
            }),
        ))?
        .stage(StageDescriptor::new(
            "scene-references",
            InputMatcher::extensions(["scene"]),
            "Scene",
            stage_fn(|ctx| async move {
                let references: Vec<String> =
                    ctx.raw()?.text()?.lines().map(str::to_string).collect();
                anyhow::Ok(AssetValue::new(references))
            }),
        ))?
        .stage(StageDescriptor::new(
            "scene",
            InputMatcher::of_type("Scene"),
            "SceneAsset",
            stage_fn(|ctx| async move {
                let references = ctx.input_as::<Vec<String>>()?;
                let textures = ctx
                    .load_all(references.iter().map(|r| (r.as_str(), "Texture")))
                    .await?;
                anyhow::Ok(AssetValue::new(SceneAsset { textures }))
            }),
        ))?
        .build();

    let (a, b) = futures::join!(
        manager.load_as::<SceneAsset>("/scenes/a.scene"),
        manager.load_as::<SceneAsset>("/scenes/b.scene"),
    );
    let (a, b) = (a?, b?);

    let loads = texture_loads.lock().unwrap().clone();
    assert_eq!(
        loads.iter().filter(|l| l.as_str() == "/textures/wood.png").count(),
        1
    );
    assert_eq!(loads.len(), 2);

    assert_eq!(a.textures.len(), 1);
    assert_eq!(b.textures.len(), 2);
    assert!(a.textures[0].ptr_eq(&b.textures[0]));
    assert_eq!(b.textures[1].downcast::<Texture>()?.size, 9);
    Ok(())
}

#[tokio::test]
async fn test_failure_stops_the_chain() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.three", "payload")?;
    let third_runs = Arc::new(AtomicUsize::new(0));
    let counter = third_runs.clone();

    let manager = AssetManager::builder()
        .shared_source(memory)
        .stage(StageDescriptor::new(
            "first",
            InputMatcher::extensions(["three"]),
            "One",
            stage_fn(|_ctx| async { anyhow::Ok(AssetValue::new(1u8)) }),
        ))?
        .stage(StageDescriptor::new(
            "second",
            InputMatcher::of_type("One"),
            "Two",
            stage_fn(|_ctx| async { Err::<AssetValue, _>(anyhow::anyhow!("bad magic number")) }),
        ))?
        .stage(StageDescriptor::new(
            "third",
            InputMatcher::of_type("Two"),
            "Three",
            stage_fn(move |_ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(AssetValue::new(3u8)) }
            }),
        ))?
        .build();

    let err = manager.load("/x.three", "Three").await.unwrap_err();
    match &err {
        LoadError::Stage { stage, target, .. } => {
            assert_eq!(stage, "second");
            assert_eq!(target.as_str(), "Three");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("bad magic number"));
    assert_eq!(third_runs.load(Ordering::SeqCst), 0);
    assert_eq!(
        manager.entry_state("/x.three", "Three"),
        Some(EntryState::Failed)
    );
    assert!(manager.lookup("/x.three", "Three").unwrap().is_err());
    assert_eq!(manager.stats().chains_failed, 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_pipeline_names_source_and_target() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.bar", "never read")?;
    let manager = widget_manager(memory.clone(), Arc::default())?;

    let err = manager.load("/x.bar", "Widget").await.unwrap_err();
    assert!(matches!(
        &err,
        LoadError::NoPipeline { input: SourceKind::Extension(ext), .. } if ext == ".bar"
    ));
    let message = err.to_string();
    assert!(message.contains(".bar"), "{message}");
    assert!(message.contains("Widget"), "{message}");
    assert_eq!(memory.fetch_count(), 0);

    assert!(manager.can_load(&SourceKind::Extension(".foo".into()), "Widget"));
    assert!(!manager.can_load(&SourceKind::Extension(".bar".into()), "Widget"));
    Ok(())
}

#[tokio::test]
async fn test_missing_source_is_not_found() -> Result<()> {
    let manager = widget_manager(Arc::new(MemorySource::new()), Arc::default())?;
    let err = manager.load("/nowhere.foo", "Widget").await.unwrap_err();
    assert!(matches!(err, LoadError::NotFound { ref locator } if locator.as_str() == "/nowhere.foo"));
    Ok(())
}

#[tokio::test]
async fn test_self_reference_is_reported_instead_of_hanging() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/a.loop", "")?;
    let manager = AssetManager::builder()
        .shared_source(memory)
        .stage(StageDescriptor::new(
            "loop",
            InputMatcher::extensions(["loop"]),
            "Loop",
            stage_fn(|ctx| async move {
                let me = ctx.locator().as_str().to_string();
                ctx.load(&me, "Loop").await?;
                anyhow::Ok(AssetValue::new(()))
            }),
        ))?
        .build();

    let err = manager.load("/a.loop", "Loop").await.unwrap_err();
    assert!(matches!(err, LoadError::Dependency { .. }));
    assert!(matches!(
        err.root_cause(),
        LoadError::CircularDependency { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_panicking_stage_aborts_the_load() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/a.boom", "")?;
    let manager = AssetManager::builder()
        .shared_source(memory)
        .stage(StageDescriptor::new(
            "boom",
            InputMatcher::extensions(["boom"]),
            "Widget",
            stage_fn(|_ctx| async {
                if true {
                    panic!("decoder bug");
                }
                anyhow::Ok(AssetValue::new(()))
            }),
        ))?
        .build();

    let err = manager.load("/a.boom", "Widget").await.unwrap_err();
    match &err {
        LoadError::Aborted { reason, .. } => assert!(reason.contains("decoder bug")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        manager.entry_state("/a.boom", "Widget"),
        Some(EntryState::Failed)
    );
    Ok(())
}

#[test]
fn test_loading_outside_a_runtime_fails_cleanly() -> Result<()> {
    let memory = Arc::new(MemorySource::new());
    memory.insert("/x.foo", "hello")?;
    let manager = widget_manager(memory, Arc::default())?;

    let result = futures::executor::block_on(manager.load("/x.foo", "Widget"));
    assert!(matches!(result, Err(LoadError::Aborted { .. })));
    assert_eq!(manager.cached(), 0);
    Ok(())
}
