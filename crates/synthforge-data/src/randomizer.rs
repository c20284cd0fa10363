//! Domain randomization: N perturbed copies of one analysis document.
//!
//! Appearance, lighting, contact coefficients and camera framing are redrawn
//! uniformly from closed ranges. Geometry, masses, velocities (unless a
//! multiplier range is configured) and the timeline are copied verbatim.

use crate::error::RandomizeError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use synthforge_core::color::hsv_to_rgb;
use synthforge_core::{
    AnalysisDocument, DomeLight, KeyLight, Material, RandomizationConfig, Range, ValidationError,
    Vec3,
};

const DEFAULT_DOME_INTENSITY: f64 = 1000.0;
const DEFAULT_KEY_INTENSITY: f64 = 5000.0;

/// A variation that failed validation after sampling
#[derive(Debug)]
pub struct Rejected {
    pub variation_id: u32,
    pub seed: u64,
    pub reason: ValidationError,
}

#[derive(Debug, Default)]
pub struct VariationBatch {
    /// Valid variations in `variation_id` order
    pub variations: Vec<AnalysisDocument>,
    pub rejected: Vec<Rejected>,
}

impl VariationBatch {
    pub fn len(&self) -> usize {
        self.variations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }
}

pub struct Randomizer {
    config: RandomizationConfig,
    rng: StdRng,
}

impl Randomizer {
    /// Seeded master RNG makes the whole batch reproducible; `None` draws fresh entropy.
    /// The ranges are checked here so every later draw is in bounds.
    pub fn new(config: RandomizationConfig, seed: Option<u64>) -> Result<Self, RandomizeError> {
        config.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &RandomizationConfig {
        &self.config
    }

    pub fn generate(
        &mut self,
        base: &AnalysisDocument,
        count: u32,
    ) -> Result<VariationBatch, RandomizeError> {
        if count == 0 {
            return Err(RandomizeError::ZeroCount);
        }
        base.validate().map_err(RandomizeError::InvalidBase)?;

        tracing::info!("Generating {} variations", count);
        let mut batch = VariationBatch::default();

        for id in 0..count {
            let seed: u64 = self.rng.gen();
            let variation = self.vary(base, id, seed);
            match variation.validate() {
                Ok(()) => {
                    tracing::debug!("{}", summarize(&variation));
                    batch.variations.push(variation);
                }
                Err(reason) => {
                    tracing::warn!("Variation {} (seed {}) rejected: {}", id, seed, reason);
                    batch.rejected.push(Rejected { variation_id: id, seed, reason });
                }
            }
        }

        tracing::info!(
            "Generated {} variations ({} rejected)",
            batch.variations.len(),
            batch.rejected.len()
        );
        Ok(batch)
    }

    /// One variation from its own seed. Same base + seed + config gives the same document.
    pub fn vary(&self, base: &AnalysisDocument, variation_id: u32, seed: u64) -> AnalysisDocument {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut doc = base.clone();

        self.randomize_materials(&mut doc, &mut rng);
        self.randomize_lighting(&mut doc, &mut rng);
        self.randomize_physics(&mut doc, &mut rng);
        self.randomize_camera(&mut doc, &mut rng);

        doc.variation_id = Some(variation_id);
        doc.randomization_seed = Some(seed);
        doc
    }

    fn randomize_materials(&self, doc: &mut AnalysisDocument, rng: &mut impl Rng) {
        let ranges = &self.config.material;
        for object in &mut doc.scene_composition.objects {
            let hue = sample(rng, ranges.hue);
            let saturation = sample(rng, ranges.saturation);
            let value = sample(rng, ranges.value);
            object.material = Some(Material {
                hue,
                saturation,
                value,
                base_color: hsv_to_rgb(hue, saturation, value),
                roughness: sample(rng, ranges.roughness),
                metallic: sample(rng, ranges.metallic),
            });
        }
    }

    fn randomize_lighting(&self, doc: &mut AnalysisDocument, rng: &mut impl Rng) {
        let ranges = &self.config.lighting;
        let mut lighting = doc.lighting();

        let mut dome = lighting.dome_light.take().unwrap_or(DomeLight {
            intensity: DEFAULT_DOME_INTENSITY,
            texture: None,
            rotation: None,
        });
        dome.intensity = sample(rng, ranges.dome_intensity);
        dome.rotation = Some(sample(rng, ranges.dome_rotation));

        let mut key = lighting
            .key_light
            .take()
            .unwrap_or_else(|| KeyLight::with_intensity(DEFAULT_KEY_INTENSITY));
        key.intensity = sample(rng, ranges.key_intensity);
        key.position = Vec3::new(
            sample(rng, ranges.key_position_x),
            sample(rng, ranges.key_position_y),
            sample(rng, ranges.key_position_z),
        );
        key.color_temperature = Some(sample(rng, ranges.color_temperature));

        lighting.dome_light = Some(dome);
        lighting.key_light = Some(key);
        doc.lighting_conditions = Some(lighting);
    }

    fn randomize_physics(&self, doc: &mut AnalysisDocument, rng: &mut impl Rng) {
        let ranges = &self.config.physics;
        for object in &mut doc.physics_estimation.objects {
            object.static_friction = sample(rng, ranges.static_friction);
            object.dynamic_friction = Some(sample(rng, ranges.dynamic_friction));
            object.restitution = sample(rng, ranges.restitution);

            if let Some(range) = ranges.mass_multiplier {
                object.mass *= sample(rng, range);
            }
            if let Some(range) = ranges.velocity_scale {
                object.initial_velocity = object.initial_velocity * sample(rng, range);
            }
        }
    }

    fn randomize_camera(&self, doc: &mut AnalysisDocument, rng: &mut impl Rng) {
        let ranges = &self.config.camera;
        let mut camera = doc.camera();
        let offset = Vec3::new(
            sample(rng, ranges.offset_x),
            sample(rng, ranges.offset_y),
            sample(rng, ranges.offset_z),
        );
        camera.position = camera.position + offset;
        camera.focal_length = sample(rng, ranges.focal_length);
        doc.camera_estimation = Some(camera);
    }
}

fn sample(rng: &mut impl Rng, range: Range) -> f64 {
    rng.gen_range(range.min..=range.max)
}

/// One line describing what changed in a variation
pub fn summarize(doc: &AnalysisDocument) -> String {
    let colors: Vec<String> = doc
        .scene_composition
        .objects
        .iter()
        .filter_map(|o| o.material.as_ref())
        .map(|m| {
            let c = m.base_color;
            format!("rgb({:.2},{:.2},{:.2})", c.r, c.g, c.b)
        })
        .collect();
    let dome = doc
        .lighting_conditions
        .as_ref()
        .and_then(|l| l.dome_light.as_ref())
        .map(|d| d.intensity)
        .unwrap_or(0.0);
    let friction = doc
        .physics_estimation
        .objects
        .first()
        .map(|p| p.static_friction)
        .unwrap_or(0.0);

    format!(
        "variation {}: colors [{}], dome {:.0}, friction {:.2}",
        doc.variation_id.unwrap_or(0),
        colors.join(", "),
        dome,
        friction
    )
}
