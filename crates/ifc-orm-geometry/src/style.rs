// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface colors of representation items
//!
//! `IfcStyledItem` → (`IfcPresentationStyleAssignment` →) `IfcSurfaceStyle`
//! → `IfcSurfaceStyleShading` → `IfcColourRgb`.

use ifc_orm_model::{EntityId, EntityResolver, Style};
use rustc_hash::FxHashMap;

/// Styles keyed by the representation item they are attached to
#[derive(Debug, Clone, Default)]
pub struct StyleIndex {
    by_item: FxHashMap<EntityId, Style>,
}

impl StyleIndex {
    /// Scan every `IfcStyledItem` of a file
    ///
    /// When several styled items target the same item the first one wins.
    pub fn build(resolver: &dyn EntityResolver) -> Self {
        let mut by_item = FxHashMap::default();
        for styled in resolver.by_type("IfcStyledItem", true) {
            let Some(item) = styled.get_ref(0) else {
                continue;
            };
            if by_item.contains_key(&item) {
                continue;
            }
            let styles = styled.get_refs(1).unwrap_or_default();
            if let Some(mut style) = styles.into_iter().find_map(|s| surface_style(resolver, s)) {
                if style.name.is_none() {
                    style.name = styled.get_string(2).map(str::to_string);
                }
                by_item.insert(item, style);
            }
        }
        log::debug!("indexed surface styles for {} items", by_item.len());
        Self { by_item }
    }

    pub fn get(&self, item: EntityId) -> Option<&Style> {
        self.by_item.get(&item)
    }

    /// Style of the first styled item among `items`
    pub fn style_for(&self, items: &[EntityId]) -> Option<&Style> {
        items.iter().find_map(|id| self.by_item.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_item.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_item.is_empty()
    }
}

/// Resolve a presentation style (or IFC2X3 style assignment) to a color
pub fn surface_style(resolver: &dyn EntityResolver, id: EntityId) -> Option<Style> {
    let style = resolver.get(id)?;

    if resolver.is_subtype_of(&style.type_name, "IfcPresentationStyleAssignment") {
        return style
            .get_refs(0)?
            .into_iter()
            .find_map(|s| surface_style(resolver, s));
    }
    if !resolver.is_subtype_of(&style.type_name, "IfcSurfaceStyle") {
        return None;
    }

    // IFCSURFACESTYLE(Name, Side, Styles)
    let color = style
        .get_refs(2)?
        .into_iter()
        .find_map(|element| shading_color(resolver, element))?;
    Some(Style {
        name: style.get_string(0).map(str::to_string),
        color,
    })
}

/// RGBA of an `IfcSurfaceStyleShading` or `IfcSurfaceStyleRendering`
fn shading_color(resolver: &dyn EntityResolver, id: EntityId) -> Option<[f32; 4]> {
    let shading = resolver.get(id)?;
    if !resolver.is_subtype_of(&shading.type_name, "IfcSurfaceStyleShading") {
        return None;
    }
    let colour = resolver.get(shading.get_ref(0)?)?;
    // IFCCOLOURRGB(Name, Red, Green, Blue)
    let channel = |i| colour.get_float(i).unwrap_or(0.0).clamp(0.0, 1.0) as f32;
    // Transparency follows SurfaceColour in both schema versions
    let transparency = shading.get_float(1).unwrap_or(0.0).clamp(0.0, 1.0) as f32;
    Some([channel(1), channel(2), channel(3), 1.0 - transparency])
}
