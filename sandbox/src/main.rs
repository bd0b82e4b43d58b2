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

// Kiln Sandbox
// Builds voxel models out of a made up `.pixels` format.
//
// Two stages are registered: `.pixels` -> PixelsData and PixelsData -> Model.
// The resolver connects them when a `.pixels` file is requested as a Model.
// A JSON gallery references several models and loads them concurrently.

use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_sdk::io::MemorySource;
use kiln_sdk::lanes::builtin::json_asset_stage;
use kiln_sdk::prelude::*;
use serde::Deserialize;

const MEGAMAN: &str = "\
0001100
0014410
0144441
0141141
0144441
0011110";

const MARIO: &str = "\
0111110
1111111
0033300
0333330
0044400";

/// Rows of palette indices, one character per cube.
struct PixelsData(String);

impl Asset for PixelsData {
    const TYPE_NAME: &'static str = "PixelsData";
}

#[derive(Debug, Clone, Copy)]
struct Cube {
    position: [f32; 3],
    color: [u8; 4],
}

#[derive(Debug)]
struct Model {
    cubes: Vec<Cube>,
    min: [f32; 3],
    max: [f32; 3],
}

impl Asset for Model {
    const TYPE_NAME: &'static str = "Model";
}

#[derive(Debug, Deserialize)]
struct Gallery {
    title: String,
    models: Vec<String>,
}

impl Asset for Gallery {
    const TYPE_NAME: &'static str = "Gallery";
}

struct Showcase {
    title: String,
    models: Vec<AssetHandle<Model>>,
}

impl Asset for Showcase {
    const TYPE_NAME: &'static str = "Showcase";
}

fn palette(index: char) -> Option<[u8; 4]> {
    let color = match index {
        '0' => [0, 0, 0, 255],
        '1' => [255, 0, 0, 255],
        '2' => [0, 255, 0, 255],
        '3' => [255, 255, 0, 255],
        '4' => [0, 0, 255, 255],
        '5' => [255, 0, 255, 255],
        '6' => [0, 255, 255, 255],
        '7' => [255, 255, 255, 255],
        _ => return None,
    };
    Some(color)
}

fn build_model(pixels: &str, gap: f32) -> Model {
    let rows: Vec<&str> = pixels.lines().map(str::trim).collect();
    let height = rows.len() as f32;
    let mut cubes = Vec::new();
    for (y, row) in rows.iter().enumerate() {
        let width = row.chars().count() as f32;
        let colored = row
            .chars()
            .enumerate()
            .filter_map(|(x, index)| palette(index).map(|color| (x, color)));
        for (x, color) in colored {
            let (x, y) = (x as f32, y as f32);
            cubes.push(Cube {
                position: [
                    x - width / 2.0 + 0.5 + x * gap,
                    height - y - height / 2.0 + 0.5 - y * gap,
                    0.0,
                ],
                color,
            });
        }
    }

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for cube in &cubes {
        for axis in 0..3 {
            min[axis] = min[axis].min(cube.position[axis] - 0.5);
            max[axis] = max[axis].max(cube.position[axis] + 0.5);
        }
    }
    Model { cubes, min, max }
}

fn register_stages(builder: AssetManagerBuilder) -> Result<AssetManagerBuilder> {
    let builder = builder
        .stage(StageDescriptor::new(
            "pixels",
            InputMatcher::extensions(["pixels"]),
            TypeTag::of::<PixelsData>(),
            stage_fn(|ctx| async move {
                let text = ctx.raw()?.text()?.to_string();
                anyhow::Ok(AssetValue::new(PixelsData(text)))
            }),
        ))?
        .stage(StageDescriptor::new(
            "pixels-model",
            InputMatcher::of_type(TypeTag::of::<PixelsData>()),
            TypeTag::of::<Model>(),
            stage_fn(|ctx| async move {
                let pixels = ctx.input_as::<PixelsData>()?;
                let gap = ctx.options().get::<f32>("gap").unwrap_or(0.1);
                let model = build_model(&pixels.0, gap);
                if model.cubes.is_empty() {
                    anyhow::bail!("'{}' contains no pixels", ctx.locator());
                }
                anyhow::Ok(AssetValue::new(model))
            }),
        ))?
        .stage(json_asset_stage::<Gallery>())?
        .stage(StageDescriptor::new(
            "showcase",
            InputMatcher::of_type(TypeTag::of::<Gallery>()),
            TypeTag::of::<Showcase>(),
            stage_fn(|ctx| async move {
                let gallery = ctx.input_as::<Gallery>()?;
                let values = ctx
                    .load_all(gallery.models.iter().map(|m| (m.as_str(), Model::TYPE_NAME)))
                    .await?;
                let models = values
                    .iter()
                    .map(AssetHandle::<Model>::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                anyhow::Ok(AssetValue::new(Showcase {
                    title: gallery.title.clone(),
                    models,
                }))
            }),
        ))?;
    Ok(builder)
}

#[tokio::main]
async fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let memory = Arc::new(MemorySource::new());
    memory.insert("/models/megaman.pixels", MEGAMAN)?;
    memory.insert("/models/mario.pixels", MARIO)?;
    memory.insert("/models/empty.pixels", "\n")?;
    memory.insert(
        "/galleries/retro.json",
        r#"{ "title": "Retro", "models": ["../models/megaman.pixels", "../models/mario.pixels"] }"#,
    )?;

    // An optional directory argument is searched after the built-in samples.
    let mut builder = AssetManager::builder().shared_source(memory);
    if let Some(root) = std::env::args().nth(1) {
        log::info!("Also serving files from {root}");
        builder = builder.directory(root);
    }
    let manager = register_stages(builder.builtin_stages()?)?.build();

    let showcase = manager
        .load_as::<Showcase>("/galleries/retro.json")
        .await
        .context("Failed to load the gallery")?;
    log::info!("Gallery '{}':", showcase.title);
    for model in &showcase.models {
        let lit = model
            .cubes
            .iter()
            .filter(|cube| cube.color != [0, 0, 0, 255])
            .count();
        log::info!(
            "  {} cubes ({lit} lit), bounds {:?} .. {:?}",
            model.cubes.len(),
            model.min,
            model.max
        );
    }

    // Already cached by the gallery.
    let megaman = manager.load_as::<Model>("/models/megaman.pixels").await?;
    log::info!(
        "Megaman shared with the gallery: {}",
        megaman.ptr_eq(&showcase.models[0])
    );

    // Starts from an in-memory PixelsData instead of fetching.
    let request = LoadRequest::new("/models/mario-spaced.pixels", Model::TYPE_NAME)
        .with_input(
            TypeTag::of::<PixelsData>(),
            AssetValue::new(PixelsData(MARIO.into())),
        )
        .with_options(LoadOptions::new().with("gap", 0.5));
    let spaced = manager.load_request(request).await?;
    let spaced = AssetHandle::<Model>::from_value(&spaced)?;
    log::info!("Spaced out Mario spans {:?} .. {:?}", spaced.min, spaced.max);

    if let Err(err) = manager.load("/models/empty.pixels", Model::TYPE_NAME).await {
        log::warn!("As expected: {err}");
    }
    if let Err(err) = manager.load("/models/megaman.pixels", Json::TYPE_NAME).await {
        log::warn!("As expected: {err}");
    }

    log::info!("{:?}", manager.stats());
    Ok(())
}
