//! Isaac Sim script emission.
//!
//! Pure templating: a document plus [`ScriptOptions`] become one standalone
//! Python program for Isaac Sim's bundled interpreter. The script takes the
//! output video path as its first argument.

use crate::error::EmissionError;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use synthforge_core::{AnalysisDocument, Primitive, SceneObject, ScriptOptions, Vec3};

pub struct ScriptEmitter {
    options: ScriptOptions,
}

impl ScriptEmitter {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    /// Render the script text. Same document and options give the same bytes.
    pub fn emit(&self, doc: &AnalysisDocument) -> Result<String, EmissionError> {
        check_finite(doc)?;
        let prims = prim_names(doc)?;

        let mut out = String::with_capacity(8 * 1024);
        self.write_header(&mut out, doc);
        self.write_boot(&mut out);
        write_stage(&mut out, doc);
        self.write_ground(&mut out);
        for (object, prim) in doc.scene_composition.objects.iter().zip(&prims) {
            write_object(&mut out, doc, object, prim);
        }
        write_lights(&mut out, doc);
        write_camera(&mut out, doc);
        self.write_capture(&mut out);
        Ok(out)
    }

    /// Emit and write to `path`, creating the parent directory
    pub fn write_script(&self, path: &Path, doc: &AnalysisDocument) -> Result<(), EmissionError> {
        let script = self.emit(doc)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| EmissionError::Write { path: parent.to_path_buf(), source })?;
        }
        std::fs::write(path, script)
            .map_err(|source| EmissionError::Write { path: path.to_path_buf(), source })?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    fn write_header(&self, out: &mut String, doc: &AnalysisDocument) {
        out.push_str("#!/usr/bin/env python3\n");
        out.push_str("# Generated by synthforge. Run with Isaac Sim's python.sh:\n");
        out.push_str("#   python.sh <this script> [output.mp4]\n");
        match (doc.variation_id, doc.randomization_seed) {
            (Some(id), Some(seed)) => {
                let _ = writeln!(out, "# Variation {} (seed {})", id, seed);
            }
            (Some(id), None) => {
                let _ = writeln!(out, "# Variation {}", id);
            }
            _ => out.push_str("# Base scene\n"),
        }
        let _ = writeln!(
            out,
            "# Objects: {}, dynamic: {}, timeline events: {}",
            doc.scene_composition.objects.len(),
            doc.physics_estimation.objects.len(),
            doc.event_timeline.len()
        );
        out.push('\n');
    }

    fn write_boot(&self, out: &mut String) {
        let o = &self.options;
        out.push_str("import os\nimport subprocess\nimport sys\n\n");
        out.push_str("from isaacsim import SimulationApp\n\n");
        let _ = writeln!(
            out,
            "simulation_app = SimulationApp({{\"headless\": {}, \"width\": {}, \"height\": {}}})",
            if o.headless { "True" } else { "False" },
            o.width,
            o.height
        );
        out.push('\n');
        out.push_str(BOOT_IMPORTS);
        out.push('\n');
        let _ = writeln!(out, "WIDTH = {}", o.width);
        let _ = writeln!(out, "HEIGHT = {}", o.height);
        let _ = writeln!(out, "FPS = {}", o.fps);
        let _ = writeln!(out, "NUM_FRAMES = {}", o.frames);
        out.push_str(OUTPUT_PATHS);
        out.push('\n');
        out.push_str(HELPERS);
        out.push('\n');
    }

    fn write_ground(&self, out: &mut String) {
        let o = &self.options;
        let half = o.ground_size / 2.0;
        out.push_str("# Ground\n");
        out.push_str("ground = UsdGeom.Mesh.Define(stage, \"/World/Ground\")\n");
        let _ = writeln!(
            out,
            "ground.CreatePointsAttr([Gf.Vec3f({n}, 0, {n}), Gf.Vec3f({p}, 0, {n}), Gf.Vec3f({p}, 0, {p}), Gf.Vec3f({n}, 0, {p})])",
            n = num(-half),
            p = num(half)
        );
        out.push_str("ground.CreateFaceVertexCountsAttr([4])\n");
        out.push_str("ground.CreateFaceVertexIndicesAttr([0, 3, 2, 1])\n");
        out.push_str("ground.CreateNormalsAttr([Gf.Vec3f(0, 1, 0)] * 4)\n");
        let _ = writeln!(
            out,
            "add_collider(ground.GetPrim(), {}, {}, {})",
            num(o.ground_static_friction),
            num(o.ground_dynamic_friction),
            num(o.ground_restitution)
        );
        out.push('\n');
    }

    fn write_capture(&self, out: &mut String) {
        out.push_str(CAPTURE_AND_RUN);
    }
}

fn write_stage(out: &mut String, doc: &AnalysisDocument) {
    let g = doc.physics_estimation.gravity;
    let magnitude = g.magnitude();
    let direction = if magnitude > 0.0 { g * (1.0 / magnitude) } else { Vec3::new(0.0, -1.0, 0.0) };

    out.push_str("# Stage and physics scene\n");
    out.push_str("omni.usd.get_context().new_stage()\n");
    out.push_str("stage = omni.usd.get_context().get_stage()\n");
    out.push_str("UsdGeom.SetStageUpAxis(stage, UsdGeom.Tokens.y)\n");
    out.push_str("UsdGeom.SetStageMetersPerUnit(stage, 1.0)\n");
    out.push_str("world = UsdGeom.Xform.Define(stage, \"/World\")\n");
    out.push_str("stage.SetDefaultPrim(world.GetPrim())\n");
    out.push_str("UsdGeom.Scope.Define(stage, \"/World/Objects\")\n");
    out.push_str("UsdGeom.Scope.Define(stage, \"/World/Looks\")\n\n");
    out.push_str("physics_scene = UsdPhysics.Scene.Define(stage, \"/World/physicsScene\")\n");
    let _ = writeln!(out, "physics_scene.CreateGravityDirectionAttr().Set({})", vec3f(direction));
    let _ = writeln!(out, "physics_scene.CreateGravityMagnitudeAttr().Set({})", num(magnitude));
    out.push_str("physx_scene = PhysxSchema.PhysxSceneAPI.Apply(physics_scene.GetPrim())\n");
    out.push_str("physx_scene.CreateEnableCCDAttr(True)\n");
    out.push_str("physx_scene.CreateEnableStabilizationAttr(True)\n");
    out.push_str("physx_scene.CreateTimeStepsPerSecondAttr(FPS)\n\n");
}

fn write_object(out: &mut String, doc: &AnalysisDocument, object: &SceneObject, prim: &str) {
    let path = format!("/World/Objects/{}", prim);
    let s = object.scale;
    let _ = writeln!(out, "# Object {} ({})", prim, object.primitive.name());

    // Spheres and cylinder-likes carry their size in attributes; boxes use a scale op
    let (define, size_attrs, scale) = match object.shape() {
        Primitive::Sphere => ("Sphere", format!("geom.CreateRadiusAttr({})", num(s.x)), None),
        Primitive::Cylinder => (
            "Cylinder",
            format!("geom.CreateRadiusAttr({})\ngeom.CreateHeightAttr({})", num(s.x), num(s.y)),
            None,
        ),
        Primitive::Cone => (
            "Cone",
            format!("geom.CreateRadiusAttr({})\ngeom.CreateHeightAttr({})", num(s.x), num(s.y)),
            None,
        ),
        Primitive::Capsule => (
            "Capsule",
            format!("geom.CreateRadiusAttr({})\ngeom.CreateHeightAttr({})", num(s.x), num(s.y)),
            None,
        ),
        // No mesh data in the document; a unit box scaled to the extent stands in
        Primitive::Cube | Primitive::Mesh | Primitive::Unknown => ("Cube", "geom.CreateSizeAttr(1.0)".to_string(), Some(s)),
    };

    let _ = writeln!(out, "geom = UsdGeom.{}.Define(stage, \"{}\")", define, path);
    let _ = writeln!(out, "{}", size_attrs);
    let _ = writeln!(
        out,
        "set_transform(geom.GetPrim(), {}, {}, {})",
        vec3d(object.position),
        vec3f(object.rotation),
        scale.map(vec3f).unwrap_or_else(|| "None".to_string())
    );

    if let Some(material) = &object.material {
        let _ = writeln!(
            out,
            "add_visual_material(stage, geom.GetPrim(), \"{}\", {}, {}, {})",
            prim,
            vec3f_raw(material.base_color.channels()),
            num(material.roughness),
            num(material.metallic)
        );
    }

    match doc.physics_for(&object.id) {
        Some(p) => {
            let _ = writeln!(
                out,
                "add_collider(geom.GetPrim(), {}, {}, {})",
                num(p.static_friction),
                num(p.dynamic_friction()),
                num(p.restitution)
            );
            let _ = writeln!(
                out,
                "add_rigid_body(geom.GetPrim(), {}, {}, {})",
                num(p.mass),
                vec3f(p.initial_velocity),
                vec3f(p.initial_angular_velocity)
            );
        }
        None => {
            out.push_str("add_collider(geom.GetPrim(), 0.5, 0.5, 0.0)\n");
        }
    }
    out.push('\n');
}

fn write_lights(out: &mut String, doc: &AnalysisDocument) {
    let lighting = doc.lighting();
    out.push_str("# Lights\n");

    let (dome_intensity, dome_rotation) = lighting
        .dome_light
        .as_ref()
        .map(|d| (d.intensity, d.rotation))
        .unwrap_or((1000.0, None));
    out.push_str("dome = UsdLux.DomeLight.Define(stage, \"/World/DomeLight\")\n");
    let _ = writeln!(out, "dome.CreateIntensityAttr({})", num(dome_intensity));
    if let Some(rotation) = dome_rotation {
        let _ = writeln!(out, "UsdGeom.Xformable(dome.GetPrim()).AddRotateYOp().Set({})", num(rotation));
    }

    if let Some(key) = &lighting.key_light {
        let (class, extra) = match key.kind.to_ascii_lowercase().as_str() {
            "distant" | "directional" => ("DistantLight", "key.CreateAngleAttr(0.53)"),
            "disk" | "spot" => ("DiskLight", "key.CreateRadiusAttr(0.5)"),
            "rect" | "area" => ("RectLight", "key.CreateWidthAttr(1.0)\nkey.CreateHeightAttr(1.0)"),
            _ => ("SphereLight", "key.CreateRadiusAttr(0.5)"),
        };
        let _ = writeln!(out, "key = UsdLux.{}.Define(stage, \"/World/KeyLight\")", class);
        let _ = writeln!(out, "key.CreateIntensityAttr({})", num(key.intensity));
        let _ = writeln!(out, "{}", extra);
        if let Some(color) = key.color {
            let _ = writeln!(out, "key.CreateColorAttr({})", vec3f_raw(color.channels()));
        }
        if let Some(kelvin) = key.color_temperature {
            out.push_str("key.CreateEnableColorTemperatureAttr(True)\n");
            let _ = writeln!(out, "key.CreateColorTemperatureAttr({})", num(kelvin));
        }
        let _ = writeln!(out, "aim_at(key.GetPrim(), {}, Gf.Vec3d(0, 0, 0))", vec3d(key.position));
    }
    out.push('\n');
}

fn write_camera(out: &mut String, doc: &AnalysisDocument) {
    let camera = doc.camera();
    out.push_str("# Camera\n");
    out.push_str("camera = UsdGeom.Camera.Define(stage, \"/World/Camera\")\n");
    let _ = writeln!(out, "camera.CreateFocalLengthAttr({})", num(camera.focal_length));
    out.push_str("camera.CreateHorizontalApertureAttr(36.0)\n");
    out.push_str("camera.CreateVerticalApertureAttr(36.0 * HEIGHT / WIDTH)\n");
    out.push_str("camera.CreateClippingRangeAttr(Gf.Vec2f(0.01, 1000.0))\n");
    let _ = writeln!(
        out,
        "aim_at(camera.GetPrim(), {}, {})",
        vec3d(camera.position),
        vec3d(camera.look_at)
    );
    out.push('\n');
}

/// USD prim name for an object id: `[A-Za-z0-9_]` only, never starting with a digit
pub fn prim_name(id: &str) -> String {
    let mut name: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn prim_names(doc: &AnalysisDocument) -> Result<Vec<String>, EmissionError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut names = Vec::with_capacity(doc.scene_composition.objects.len());
    for object in &doc.scene_composition.objects {
        let prim = prim_name(&object.id);
        if let Some(first) = seen.insert(prim.clone(), object.id.as_str()) {
            return Err(EmissionError::DuplicatePrimName {
                first: first.to_string(),
                second: object.id.clone(),
                prim,
            });
        }
        names.push(prim);
    }
    Ok(names)
}

/// Every number that reaches the script must be finite
fn check_finite(doc: &AnalysisDocument) -> Result<(), EmissionError> {
    fn push_vec(values: &mut Vec<(String, f64)>, field: String, v: Vec3) {
        values.push((format!("{field}.x"), v.x));
        values.push((format!("{field}.y"), v.y));
        values.push((format!("{field}.z"), v.z));
    }

    let mut values: Vec<(String, f64)> = Vec::new();

    for (i, o) in doc.scene_composition.objects.iter().enumerate() {
        let at = format!("scene_composition.objects[{i}]");
        push_vec(&mut values, format!("{at}.position"), o.position);
        push_vec(&mut values, format!("{at}.rotation"), o.rotation);
        push_vec(&mut values, format!("{at}.scale"), o.scale);
        if let Some(m) = &o.material {
            values.push((format!("{at}.material.base_color.r"), m.base_color.r));
            values.push((format!("{at}.material.base_color.g"), m.base_color.g));
            values.push((format!("{at}.material.base_color.b"), m.base_color.b));
            values.push((format!("{at}.material.roughness"), m.roughness));
            values.push((format!("{at}.material.metallic"), m.metallic));
        }
    }

    push_vec(&mut values, "physics_estimation.gravity".to_string(), doc.physics_estimation.gravity);
    for (i, p) in doc.physics_estimation.objects.iter().enumerate() {
        let at = format!("physics_estimation.objects[{i}]");
        values.push((format!("{at}.mass"), p.mass));
        values.push((format!("{at}.restitution"), p.restitution));
        values.push((format!("{at}.static_friction"), p.static_friction));
        values.push((format!("{at}.dynamic_friction"), p.dynamic_friction()));
        push_vec(&mut values, format!("{at}.initial_velocity"), p.initial_velocity);
        push_vec(&mut values, format!("{at}.initial_angular_velocity"), p.initial_angular_velocity);
    }

    let lighting = doc.lighting();
    if let Some(d) = &lighting.dome_light {
        values.push(("lighting_conditions.dome_light.intensity".to_string(), d.intensity));
        if let Some(r) = d.rotation {
            values.push(("lighting_conditions.dome_light.rotation".to_string(), r));
        }
    }
    if let Some(k) = &lighting.key_light {
        values.push(("lighting_conditions.key_light.intensity".to_string(), k.intensity));
        push_vec(&mut values, "lighting_conditions.key_light.position".to_string(), k.position);
        if let Some(c) = k.color {
            values.push(("lighting_conditions.key_light.color.r".to_string(), c.r));
            values.push(("lighting_conditions.key_light.color.g".to_string(), c.g));
            values.push(("lighting_conditions.key_light.color.b".to_string(), c.b));
        }
        if let Some(t) = k.color_temperature {
            values.push(("lighting_conditions.key_light.color_temperature".to_string(), t));
        }
    }

    let camera = doc.camera();
    push_vec(&mut values, "camera_estimation.position".to_string(), camera.position);
    push_vec(&mut values, "camera_estimation.look_at".to_string(), camera.look_at);
    values.push(("camera_estimation.focal_length".to_string(), camera.focal_length));

    match values.into_iter().find(|(_, v)| !v.is_finite()) {
        Some((field, _)) => Err(EmissionError::NonFinite { field }),
        None => Ok(()),
    }
}

/// Fixed six-decimal formatting, trailing zeros trimmed, always with a decimal point
fn num(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };  // no "-0.0"
    let s = format!("{:.6}", v);
    let s = s.trim_end_matches('0');
    if s == "-0." {
        "0.0".to_string()
    } else if s.ends_with('.') {
        format!("{s}0")
    } else {
        s.to_string()
    }
}

fn vec3f(v: Vec3) -> String {
    vec3f_raw(v.components())
}

fn vec3f_raw(c: [f64; 3]) -> String {
    format!("Gf.Vec3f({}, {}, {})", num(c[0]), num(c[1]), num(c[2]))
}

fn vec3d(v: Vec3) -> String {
    format!("Gf.Vec3d({}, {}, {})", num(v.x), num(v.y), num(v.z))
}

const BOOT_IMPORTS: &str = r#"import carb
import omni.replicator.core as rep
import omni.timeline
import omni.usd
from pxr import Gf, PhysxSchema, Sdf, UsdGeom, UsdLux, UsdPhysics, UsdShade
"#;

const OUTPUT_PATHS: &str = r#"
OUTPUT_PATH = os.path.abspath(sys.argv[1] if len(sys.argv) > 1 else os.path.splitext(__file__)[0] + ".mp4")
OUTPUT_STEM = os.path.splitext(OUTPUT_PATH)[0]
FRAMES_DIR = OUTPUT_STEM + "_frames"
USD_PATH = OUTPUT_STEM + ".usd"
os.makedirs(FRAMES_DIR, exist_ok=True)
"#;

const HELPERS: &str = r#"def set_transform(prim, position, rotation_deg, scale=None):
    xform = UsdGeom.Xformable(prim)
    xform.ClearXformOpOrder()
    xform.AddTranslateOp().Set(position)
    xform.AddRotateXYZOp().Set(rotation_deg)
    if scale is not None:
        xform.AddScaleOp().Set(scale)


def aim_at(prim, eye, target):
    view = Gf.Matrix4d().SetLookAt(eye, target, Gf.Vec3d(0, 1, 0))
    xform = UsdGeom.Xformable(prim)
    xform.ClearXformOpOrder()
    xform.AddTransformOp().Set(view.GetInverse())


def add_visual_material(stage, prim, name, color, roughness, metallic):
    material = UsdShade.Material.Define(stage, "/World/Looks/" + name)
    shader = UsdShade.Shader.Define(stage, "/World/Looks/" + name + "/Shader")
    shader.CreateIdAttr("UsdPreviewSurface")
    shader.CreateInput("diffuseColor", Sdf.ValueTypeNames.Color3f).Set(color)
    shader.CreateInput("roughness", Sdf.ValueTypeNames.Float).Set(roughness)
    shader.CreateInput("metallic", Sdf.ValueTypeNames.Float).Set(metallic)
    material.CreateSurfaceOutput().ConnectToSource(shader.ConnectableAPI(), "surface")
    UsdShade.MaterialBindingAPI.Apply(prim).Bind(material)


def add_collider(prim, static_friction, dynamic_friction, restitution):
    UsdPhysics.CollisionAPI.Apply(prim)
    material = UsdPhysics.MaterialAPI.Apply(prim)
    material.CreateStaticFrictionAttr(static_friction)
    material.CreateDynamicFrictionAttr(dynamic_friction)
    material.CreateRestitutionAttr(restitution)


def add_rigid_body(prim, mass, velocity, angular_velocity):
    body = UsdPhysics.RigidBodyAPI.Apply(prim)
    body.CreateVelocityAttr(velocity)
    body.CreateAngularVelocityAttr(angular_velocity)
    UsdPhysics.MassAPI.Apply(prim).CreateMassAttr(mass)
"#;

const CAPTURE_AND_RUN: &str = r#"# Capture
render_product = rep.create.render_product("/World/Camera", (WIDTH, HEIGHT))
writer = rep.WriterRegistry.get("BasicWriter")
writer.initialize(output_dir=FRAMES_DIR, rgb=True)
writer.attach([render_product])

# Simulate
timeline = omni.timeline.get_timeline_interface()
timeline.set_target_framerate(FPS)
timeline.play()
for frame in range(NUM_FRAMES):
    rep.orchestrator.step(rt_subframes=1, delta_time=1.0 / FPS)
timeline.stop()
rep.orchestrator.wait_until_complete()

stage.Export(USD_PATH)
carb.log_info("Saved stage to " + USD_PATH)

# Encode
frames = sorted(f for f in os.listdir(FRAMES_DIR) if f.startswith("rgb_") and f.endswith(".png"))
exit_code = 0
if frames:
    pattern = os.path.join(FRAMES_DIR, "rgb_%04d.png")
    result = subprocess.run(
        ["ffmpeg", "-y", "-loglevel", "error", "-framerate", str(FPS), "-i", pattern,
         "-c:v", "libx264", "-pix_fmt", "yuv420p", OUTPUT_PATH],
        capture_output=True,
        text=True,
    )
    if result.returncode != 0:
        sys.stderr.write(result.stderr)
        exit_code = result.returncode
else:
    sys.stderr.write("no frames captured in " + FRAMES_DIR + "\n")
    exit_code = 1

simulation_app.close()
sys.exit(exit_code)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const CUP_AND_BALL: &str = r#"{
      "scene_composition": {"objects": [
        {"id": "ball", "type": "sphere", "position": {"x": 0.0, "y": 0.5, "z": 0.0},
         "scale": {"x": 0.1, "y": 0.1, "z": 0.1}},
        {"id": "red cup", "type": "cylinder", "position": {"x": 1.0, "y": 0.1, "z": 0.0},
         "scale": {"x": 0.05, "y": 0.12, "z": 0.05}},
        {"id": "table-top", "type": "cube", "position": {"x": 0.0, "y": 0.0, "z": 0.0},
         "scale": {"x": 2.0, "y": 0.05, "z": 1.0}}
      ]},
      "physics_estimation": {"objects": [
        {"id": "ball", "mass": 0.5, "initial_velocity": {"x": 2.0, "y": 0.0, "z": 0.0},
         "restitution": 0.7, "static_friction": 0.3, "dynamic_friction": 0.25},
        {"id": "red cup", "mass": 0.2, "restitution": 0.3, "static_friction": 0.6}
      ]},
      "lighting_conditions": {
        "dome_light": {"intensity": 1000.0},
        "key_light": {"type": "distant", "intensity": 5000.0, "color_temperature": 5500.0}
      }
    }"#;

    fn doc() -> AnalysisDocument {
        AnalysisDocument::from_json_str(CUP_AND_BALL).unwrap()
    }

    #[test]
    fn test_prim_name_sanitizing() {
        assert_eq!(prim_name("ball"), "ball");
        assert_eq!(prim_name("red cup"), "red_cup");
        assert_eq!(prim_name("table-top.1"), "table_top_1");
        assert_eq!(prim_name("3d_box"), "_3d_box");
        assert_eq!(prim_name(""), "_");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(2.0), "2.0");
        assert_eq!(num(-9.81), "-9.81");
        assert_eq!(num(-0.0), "0.0");
        assert_eq!(num(1.0 / 3.0), "0.333333");
        assert_eq!(num(-0.0000001), "0.0");
    }

    #[test]
    fn test_emit_is_deterministic() {
        let emitter = ScriptEmitter::new(ScriptOptions::default());
        assert_eq!(emitter.emit(&doc()).unwrap(), emitter.emit(&doc()).unwrap());
    }

    #[test]
    fn test_script_contents() {
        let script = ScriptEmitter::new(ScriptOptions::default()).emit(&doc()).unwrap();
        assert!(script.contains("SimulationApp({\"headless\": True, \"width\": 1920, \"height\": 1080})"));
        assert!(script.contains("physics_scene.CreateGravityMagnitudeAttr().Set(9.81)"));
        assert!(script.contains("physics_scene.CreateGravityDirectionAttr().Set(Gf.Vec3f(0.0, -1.0, 0.0))"));
        assert!(script.contains("geom = UsdGeom.Sphere.Define(stage, \"/World/Objects/ball\")"));
        assert!(script.contains("geom.CreateRadiusAttr(0.1)"));
        assert!(script.contains("add_rigid_body(geom.GetPrim(), 0.5, Gf.Vec3f(2.0, 0.0, 0.0), Gf.Vec3f(0.0, 0.0, 0.0))"));
        assert!(script.contains("add_collider(geom.GetPrim(), 0.3, 0.25, 0.7)"));
        // Dynamic friction falls back to static
        assert!(script.contains("add_collider(geom.GetPrim(), 0.6, 0.6, 0.3)"));
        assert!(script.contains("\"/World/Objects/red_cup\""));
        assert!(script.contains("key = UsdLux.DistantLight.Define"));
        assert!(script.contains("key.CreateColorTemperatureAttr(5500.0)"));
        assert!(script.contains("NUM_FRAMES = 300"));
        assert!(script.contains("stage.Export(USD_PATH)"));
        assert!(script.contains("simulation_app.close()"));
    }

    #[test]
    fn test_static_object_has_no_rigid_body() {
        let script = ScriptEmitter::new(ScriptOptions::default()).emit(&doc()).unwrap();
        let table = script.split("# Object table_top").nth(1).unwrap();
        let table = table.split("\n\n").next().unwrap();
        assert!(table.contains("UsdGeom.Cube.Define"));
        assert!(table.contains("Gf.Vec3f(2.0, 0.05, 1.0))"));
        assert!(!table.contains("add_rigid_body"));
        assert_eq!(script.matches("add_rigid_body(geom").count(), 2);
    }

    #[test]
    fn test_unrecognised_types_still_emit() {
        let json = CUP_AND_BALL
            .replace(r#""type": "cylinder""#, r#""type": "vessel""#)
            .replace(r#""type": "cube""#, r#""type": "plane""#);
        let d = AnalysisDocument::from_json_str(&json).unwrap();
        let script = ScriptEmitter::new(ScriptOptions::default()).emit(&d).unwrap();
        assert!(script.contains("geom = UsdGeom.Cylinder.Define(stage, \"/World/Objects/red_cup\")"));
        assert!(script.contains("geom = UsdGeom.Cube.Define(stage, \"/World/Objects/table_top\")"));
        assert!(script.contains("# Object red_cup (unknown)"));
    }

    #[test]
    fn test_headless_flag_and_resolution() {
        let options = ScriptOptions { headless: false, width: 640, height: 480, ..ScriptOptions::default() };
        let script = ScriptEmitter::new(options).emit(&doc()).unwrap();
        assert!(script.contains("SimulationApp({\"headless\": False, \"width\": 640, \"height\": 480})"));
    }

    #[test]
    fn test_variation_header() {
        let mut d = doc();
        d.variation_id = Some(3);
        d.randomization_seed = Some(77);
        let script = ScriptEmitter::new(ScriptOptions::default()).emit(&d).unwrap();
        assert!(script.contains("# Variation 3 (seed 77)"));
    }

    #[test]
    fn test_colliding_prim_names_rejected() {
        let mut d = doc();
        d.scene_composition.objects[2].id = "red-cup".to_string();
        match ScriptEmitter::new(ScriptOptions::default()).emit(&d) {
            Err(EmissionError::DuplicatePrimName { first, second, prim }) => {
                assert_eq!(first, "red cup");
                assert_eq!(second, "red-cup");
                assert_eq!(prim, "red_cup");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut d = doc();
        d.physics_estimation.objects[0].initial_velocity.y = f64::INFINITY;
        match ScriptEmitter::new(ScriptOptions::default()).emit(&d) {
            Err(EmissionError::NonFinite { field }) => {
                assert_eq!(field, "physics_estimation.objects[0].initial_velocity.y")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_write_script_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usd_scenes").join("base_scene.py");
        let emitter = ScriptEmitter::new(ScriptOptions::default());
        emitter.write_script(&path, &doc()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), emitter.emit(&doc()).unwrap());
    }
}
