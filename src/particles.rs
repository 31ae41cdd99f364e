use glam::Vec3;
use rand::Rng;

/// Firefly count used when the scene settings do not override it.
pub const DEFAULT_FIREFLY_COUNT: usize = 30;

/// Horizontal spread of the field; x and z land in `[-SPREAD/2, SPREAD/2)`.
const SPREAD: f32 = 4.0;
/// Fireflies hover in `[0, HEIGHT)` above the ground.
const HEIGHT: f32 = 1.5;

/// Procedural point cloud drawn with the firefly shader.
///
/// Positions and scales are seeded once and never resized or reseeded; the
/// field only hands out read-only views.
#[derive(Debug, Clone, PartialEq)]
pub struct FireflyField {
    positions: Vec<f32>,
    scales: Vec<f32>,
}

impl FireflyField {
    pub fn generate<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(count * 3);
        let mut scales = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push((rng.gen::<f32>() - 0.5) * SPREAD);
            positions.push(rng.gen::<f32>() * HEIGHT);
            positions.push((rng.gen::<f32>() - 0.5) * SPREAD);
            scales.push(rng.gen::<f32>());
        }
        Self { positions, scales }
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// `position` vertex attribute, three components per point.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// `aScale` vertex attribute, one component per point.
    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn point(&self, index: usize) -> Option<(Vec3, f32)> {
        let scale = *self.scales.get(index)?;
        let position = Vec3::from_slice(&self.positions[index * 3..index * 3 + 3]);
        Some((position, scale))
    }

    pub fn points(&self) -> impl Iterator<Item = (Vec3, f32)> + '_ {
        self.positions
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .zip(self.scales.iter().copied())
    }

    /// Per-instance data for the GPU: `position.xyz` followed by `scale`.
    pub fn instance_data(&self) -> Vec<f32> {
        self.points()
            .flat_map(|(position, scale)| [position.x, position.y, position.z, scale])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_in_bounds(field: &FireflyField) {
        for (position, scale) in field.points() {
            assert!((-2.0..=2.0).contains(&position.x), "x out of range: {position}");
            assert!((0.0..1.5).contains(&position.y), "y out of range: {position}");
            assert!((-2.0..=2.0).contains(&position.z), "z out of range: {position}");
            assert!((0.0..1.0).contains(&scale), "scale out of range: {scale}");
        }
    }

    #[test]
    fn default_field_has_thirty_points_within_bounds() {
        let field = FireflyField::generate(DEFAULT_FIREFLY_COUNT, &mut rand::thread_rng());
        assert_eq!(field.len(), 30);
        assert_eq!(field.positions().len(), 90);
        assert_eq!(field.scales().len(), 30);
        assert_in_bounds(&field);
    }

    #[test]
    fn many_seeds_stay_within_bounds() {
        for seed in 0..64 {
            let field = FireflyField::generate(200, &mut StdRng::seed_from_u64(seed));
            assert_in_bounds(&field);
        }
    }

    #[test]
    fn instance_data_interleaves_scale() {
        let field = FireflyField::generate(3, &mut StdRng::seed_from_u64(7));
        let data = field.instance_data();
        assert_eq!(data.len(), 12);
        let (position, scale) = field.point(1).unwrap();
        assert_eq!(&data[4..8], &[position.x, position.y, position.z, scale]);
        assert!(field.point(3).is_none());
    }

    #[test]
    fn zero_count_is_empty() {
        let field = FireflyField::generate(0, &mut rand::thread_rng());
        assert!(field.is_empty());
    }
}
