/// Fixed instruction sent alongside every video.
///
/// Keys and units here must match `synthforge_core::document`.
pub const PHYSICS_ANALYSIS_PROMPT: &str = r#"Role: physics simulation engineer preparing a rigid-body scene for NVIDIA Isaac Sim (PhysX).

Watch the whole clip and return ONE JSON object, nothing else. No prose, no Markdown.

Schema:
{
  "scene_composition": {
    "objects": [
      {
        "id": "ball",                      // unique, [A-Za-z0-9_]
        "type": "sphere",                  // sphere | cube | cylinder | cone | capsule | mesh
        "position": {"x": 0.0, "y": 0.5, "z": 0.0},   // meters, Y up
        "rotation": {"x": 0.0, "y": 0.0, "z": 0.0},   // degrees
        "scale": {"x": 0.1, "y": 0.1, "z": 0.1}       // meters, > 0 (radius for spheres)
      }
    ],
    "environment": {
      "surface_type": "table",
      "material": "wood",
      "dimensions": {"length": 2.0, "width": 1.0, "height": 0.05}
    }
  },
  "physics_estimation": {
    "gravity": {"x": 0.0, "y": -9.81, "z": 0.0},
    "objects": [
      {
        "id": "ball",                      // must match a scene object id
        "mass": 0.5,                       // kg, > 0
        "initial_velocity": {"x": 2.0, "y": 0.0, "z": 0.0},          // m/s
        "initial_angular_velocity": {"x": 0.0, "y": 0.0, "z": 0.0},  // deg/s
        "restitution": 0.7,                // 0.0 - 1.0
        "static_friction": 0.3,            // 0.0 - 1.0
        "dynamic_friction": 0.25,          // 0.0 - 1.0
        "collision_shape": "sphere"
      }
    ]
  },
  "lighting_conditions": {
    "dome_light": {"intensity": 1000.0, "texture": "studio"},
    "key_light": {
      "type": "sphere",
      "position": {"x": 5.0, "y": 5.0, "z": 5.0},
      "intensity": 5000.0,
      "color": {"r": 1.0, "g": 1.0, "b": 1.0},
      "color_temperature": 5500.0
    }
  },
  "event_timeline": [
    {"frame": 0, "event": "simulation_start", "object_id": "ball"},
    {"frame": 45, "event": "collision", "objects": ["ball", "cup"]},
    {"frame": 60, "event": "object_rest", "object_id": "cup"}
  ],
  "camera_estimation": {
    "position": {"x": 0.0, "y": 1.5, "z": 3.0},
    "look_at": {"x": 0.0, "y": 0.5, "z": 0.0},
    "focal_length": 50.0
  }
}

Rules:
1. Numbers, not adjectives ("mass": 0.5, never "light").
2. Every coefficient inside 0.0 - 1.0. Do not round to the limits to hide uncertainty.
3. At least one object needs a physics entry. Give one to every object that moves or is touched; the rest are static.
4. List events in frame order.
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_requires_a_dynamic_object() {
        assert!(PHYSICS_ANALYSIS_PROMPT.contains("At least one object needs a physics entry"));
    }

    #[test]
    fn test_static_only_scene_is_rejected() {
        let json = r#"{
          "scene_composition": {"objects": [{"id": "table", "type": "cube", "position": {"x": 0, "y": 0, "z": 0}}]},
          "physics_estimation": {"objects": []}
        }"#;
        let doc = synthforge_core::AnalysisDocument::from_json_str(json).unwrap();
        assert!(doc.validate().unwrap_err().has_issue_at("physics_estimation.objects"));
    }
}
