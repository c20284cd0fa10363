//! Schema checks for analysis documents.
//!
//! Out-of-range coefficients are reported, never clamped.

use crate::constants::TIMELINE_FPS;
use crate::document::{AnalysisDocument, Vec3};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// One failed check, addressed by a dotted path into the document
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("document failed validation ({} issue(s)): {}", .issues.len(), summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// True if any issue is reported at exactly this path
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Default)]
struct Checker {
    issues: Vec<ValidationIssue>,
}

impl Checker {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue { path: path.into(), message: message.into() });
    }

    fn finite_vec(&mut self, path: String, v: &Vec3) {
        if !v.is_finite() {
            self.fail(path, "components must be finite");
        }
    }

    fn unit_interval(&mut self, path: String, value: f64) {
        if !(0.0..=1.0).contains(&value) {
            self.fail(path, format!("{} is outside [0, 1]", value));
        }
    }

    fn non_negative(&mut self, path: String, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.fail(path, format!("{} must be finite and >= 0", value));
        }
    }

    fn positive(&mut self, path: String, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            self.fail(path, format!("{} must be finite and > 0", value));
        }
    }
}

impl AnalysisDocument {
    /// Check every schema rule and report all violations at once
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut c = Checker::default();

        let scene = &self.scene_composition;
        if scene.objects.is_empty() {
            c.fail("scene_composition.objects", "at least one object is required");
        }

        let mut scene_ids = HashSet::new();
        for (i, obj) in scene.objects.iter().enumerate() {
            let base = format!("scene_composition.objects[{}]", i);
            if obj.id.trim().is_empty() {
                c.fail(format!("{base}.id"), "must not be empty");
            } else if !scene_ids.insert(obj.id.as_str()) {
                c.fail(format!("{base}.id"), format!("duplicate object id '{}'", obj.id));
            }
            c.finite_vec(format!("{base}.position"), &obj.position);
            c.finite_vec(format!("{base}.rotation"), &obj.rotation);
            if obj.scale.components().iter().any(|s| !s.is_finite() || *s <= 0.0) {
                c.fail(format!("{base}.scale"), "components must be finite and > 0");
            }
            if let Some(m) = &obj.material {
                for (name, v) in [
                    ("hue", m.hue),
                    ("saturation", m.saturation),
                    ("value", m.value),
                    ("roughness", m.roughness),
                    ("metallic", m.metallic),
                ] {
                    c.unit_interval(format!("{base}.material.{name}"), v);
                }
                for (name, v) in ["r", "g", "b"].iter().zip(m.base_color.channels()) {
                    c.unit_interval(format!("{base}.material.base_color.{name}"), v);
                }
            }
        }

        if let Some(env) = &scene.environment {
            if let Some(d) = &env.dimensions {
                for (name, v) in [("length", d.length), ("width", d.width), ("height", d.height)] {
                    c.positive(format!("scene_composition.environment.dimensions.{name}"), v);
                }
            }
        }

        let physics = &self.physics_estimation;
        c.finite_vec("physics_estimation.gravity".to_string(), &physics.gravity);
        if physics.objects.is_empty() {
            c.fail("physics_estimation.objects", "at least one object is required");
        }

        let mut physics_ids = HashSet::new();
        for (i, obj) in physics.objects.iter().enumerate() {
            let base = format!("physics_estimation.objects[{}]", i);
            if !physics_ids.insert(obj.id.as_str()) {
                c.fail(format!("{base}.id"), format!("duplicate physics entry for '{}'", obj.id));
            }
            if !scene_ids.contains(obj.id.as_str()) {
                c.fail(format!("{base}.id"), format!("'{}' does not name a scene object", obj.id));
            }
            c.positive(format!("{base}.mass"), obj.mass);
            c.finite_vec(format!("{base}.initial_velocity"), &obj.initial_velocity);
            c.finite_vec(format!("{base}.initial_angular_velocity"), &obj.initial_angular_velocity);
            c.unit_interval(format!("{base}.restitution"), obj.restitution);
            c.unit_interval(format!("{base}.static_friction"), obj.static_friction);
            if let Some(dynamic) = obj.dynamic_friction {
                c.unit_interval(format!("{base}.dynamic_friction"), dynamic);
            }
        }

        if let Some(lighting) = &self.lighting_conditions {
            if let Some(dome) = &lighting.dome_light {
                c.non_negative("lighting_conditions.dome_light.intensity".to_string(), dome.intensity);
                if let Some(rot) = dome.rotation {
                    if !rot.is_finite() {
                        c.fail("lighting_conditions.dome_light.rotation", "must be finite");
                    }
                }
            }
            if let Some(key) = &lighting.key_light {
                c.non_negative("lighting_conditions.key_light.intensity".to_string(), key.intensity);
                c.finite_vec("lighting_conditions.key_light.position".to_string(), &key.position);
                if let Some(t) = key.color_temperature {
                    c.positive("lighting_conditions.key_light.color_temperature".to_string(), t);
                }
                if let Some(color) = &key.color {
                    for (name, v) in ["r", "g", "b"].iter().zip(color.channels()) {
                        c.unit_interval(format!("lighting_conditions.key_light.color.{name}"), v);
                    }
                }
            }
        }

        if let Some(camera) = &self.camera_estimation {
            c.finite_vec("camera_estimation.position".to_string(), &camera.position);
            c.finite_vec("camera_estimation.look_at".to_string(), &camera.look_at);
            c.positive("camera_estimation.focal_length".to_string(), camera.focal_length);
        }

        self.check_timeline(&scene_ids);

        if c.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues: c.issues })
        }
    }

    // Timeline problems are logged only
    fn check_timeline(&self, scene_ids: &HashSet<&str>) {
        let mut latest = 0.0_f64;
        for event in &self.event_timeline {
            match event.seconds(TIMELINE_FPS) {
                Some(t) if t < latest => tracing::warn!(
                    "Timeline event '{}' at {:.2}s precedes {:.2}s",
                    event.event, t, latest
                ),
                Some(t) => latest = t,
                None => tracing::warn!("Timeline event '{}' has no frame or timestamp", event.event),
            }

            for id in event.involved() {
                if !scene_ids.contains(id) {
                    tracing::warn!("Timeline event '{}' refers to unknown object '{}'", event.event, id);
                }
            }
        }
    }
}
