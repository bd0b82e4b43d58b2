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

//! Stages every content pipeline wants: text decoding and JSON parsing.

use crate::{
    registry::{RegistryError, TransformRegistry},
    stage::{stage_fn, InputMatcher, StageDescriptor},
};
use anyhow::Context as _;
use kiln_core::{Asset, AssetValue, TypeTag};
use serde::de::DeserializeOwned;

/// Sources decoded to [`Text`] by [`text_stage`].
pub const TEXT_EXTENSIONS: &[&str] = &[
    ".txt",
    ".json",
    ".ron",
    ".mtl",
    ".obj",
    "text/plain",
    "application/json",
];

/// Sources parsed to [`Json`] by [`json_stage`].
pub const JSON_EXTENSIONS: &[&str] = &[".json", "application/json"];

/// UTF-8 text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Asset for Text {
    const TYPE_NAME: &'static str = "Text";
}

/// A parsed JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Json(pub serde_json::Value);

impl Asset for Json {
    const TYPE_NAME: &'static str = "Json";
}

/// Decodes raw bytes as UTF-8.
pub fn text_stage() -> StageDescriptor {
    StageDescriptor::new(
        "text",
        InputMatcher::extensions(TEXT_EXTENSIONS),
        TypeTag::of::<Text>(),
        stage_fn(|ctx| async move {
            let raw = ctx.raw()?;
            let text = raw
                .text()
                .with_context(|| format!("'{}' is not valid UTF-8", raw.locator))?;
            anyhow::Ok(AssetValue::new(Text(text.to_string())))
        }),
    )
}

/// Parses raw bytes as JSON.
pub fn json_stage() -> StageDescriptor {
    StageDescriptor::new(
        "json",
        InputMatcher::extensions(JSON_EXTENSIONS),
        TypeTag::of::<Json>(),
        stage_fn(|ctx| async move {
            let raw = ctx.raw()?;
            let value: serde_json::Value = serde_json::from_slice(&raw.bytes)
                .with_context(|| format!("'{}' is not valid JSON", raw.locator))?;
            anyhow::Ok(AssetValue::new(Json(value)))
        }),
    )
}

/// Deserializes a [`Json`] document into the asset type `A`.
pub fn json_asset_stage<A>() -> StageDescriptor
where
    A: Asset + DeserializeOwned,
{
    StageDescriptor::new(
        format!("json-{}", A::TYPE_NAME),
        InputMatcher::of_type(TypeTag::of::<Json>()),
        TypeTag::of::<A>(),
        stage_fn(|ctx| async move {
            let json = ctx.input_as::<Json>()?;
            let asset: A = serde_json::from_value(json.0.clone()).with_context(|| {
                format!("'{}' does not describe a {}", ctx.locator(), A::TYPE_NAME)
            })?;
            anyhow::Ok(AssetValue::new(asset))
        }),
    )
}

/// Registers [`text_stage`] and [`json_stage`].
///
/// # Errors
/// Fails if equivalent stages are already registered.
pub fn register_builtin(registry: &mut TransformRegistry) -> Result<(), RegistryError> {
    registry.register(text_stage())?;
    registry.register(json_stage())?;
    Ok(())
}
