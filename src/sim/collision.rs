//! Swept-sphere collision queries and the bounce/slide response

use glam::Vec3;

use super::mover::MoverTuning;

/// Sweeps shorter than this never hit anything
const MIN_SWEEP_LENGTH: f32 = 1.0e-4;

/// Object channel a sweep is filtered against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionChannel {
    /// Level geometry that never moves
    WorldStatic,
    /// Moving bodies
    WorldDynamic,
}

/// Result of a blocked sweep. Lives for one integration step only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionOutcome {
    /// Where the swept sphere's center came to rest against the blocker
    pub impact_point: Vec3,
    /// Surface normal at the contact, pointing into free space
    pub impact_normal: Vec3,
}

/// Obstruction test for a sphere moving from `start` to `end`
pub trait CollisionQuery {
    /// `None` means the path is clear (or degenerate)
    fn sweep(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        channel: CollisionChannel,
    ) -> Option<CollisionOutcome>;
}

/// World with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSky;

impl CollisionQuery for OpenSky {
    fn sweep(&self, _: Vec3, _: Vec3, _: f32, _: CollisionChannel) -> Option<CollisionOutcome> {
        None
    }
}

/// Infinite plane `dot(normal, p) = offset`; the normal faces free space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.try_normalize().unwrap_or(Vec3::Z);
        Self {
            normal,
            offset: normal.dot(point),
        }
    }

    /// Fraction of the move at which a sphere first touches the plane
    fn time_of_impact(&self, start: Vec3, end: Vec3, radius: f32) -> Option<f32> {
        let d0 = self.normal.dot(start) - self.offset - radius;
        let d1 = self.normal.dot(end) - self.offset - radius;

        // Not moving toward the plane, or still clear at the end
        if d1 >= d0 || d1 >= 0.0 {
            return None;
        }
        if d0 <= 0.0 {
            return Some(0.0);
        }
        Some(d0 / (d0 - d1))
    }
}

/// Static level made of half-spaces
#[derive(Debug, Clone, Default)]
pub struct StaticWorld {
    planes: Vec<Plane>,
}

impl StaticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Square arena: ground at z = 0 and four walls at +-`half_extent`
    pub fn arena(half_extent: f32) -> Self {
        Self::new()
            .with_plane(Plane::from_point_normal(Vec3::ZERO, Vec3::Z))
            .with_plane(Plane::from_point_normal(Vec3::new(half_extent, 0.0, 0.0), -Vec3::X))
            .with_plane(Plane::from_point_normal(Vec3::new(-half_extent, 0.0, 0.0), Vec3::X))
            .with_plane(Plane::from_point_normal(Vec3::new(0.0, half_extent, 0.0), -Vec3::Y))
            .with_plane(Plane::from_point_normal(Vec3::new(0.0, -half_extent, 0.0), Vec3::Y))
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.planes.push(plane);
        self
    }
}

impl CollisionQuery for StaticWorld {
    fn sweep(
        &self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        channel: CollisionChannel,
    ) -> Option<CollisionOutcome> {
        if channel != CollisionChannel::WorldStatic {
            return None;
        }
        if !start.is_finite() || !end.is_finite() || start.distance(end) < MIN_SWEEP_LENGTH {
            return None;
        }

        let (t, plane) = self
            .planes
            .iter()
            .filter_map(|plane| plane.time_of_impact(start, end, radius).map(|t| (t, plane)))
            .min_by(|a, b| a.0.total_cmp(&b.0))?;

        Some(CollisionOutcome {
            impact_point: start.lerp(end, t),
            impact_normal: plane.normal,
        })
    }
}

/// Which collision regime an impact fell into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactKind {
    Bounce,
    Slide,
}

/// Position and velocity that replace the swept move for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactResponse {
    pub position: Vec3,
    pub velocity: Vec3,
    pub kind: ImpactKind,
}

/// Bounce off the surface above the skid threshold, slide along it otherwise.
///
/// A bounce never leaves a downward vertical component.
pub fn resolve_impact(
    velocity: Vec3,
    outcome: &CollisionOutcome,
    tuning: &MoverTuning,
) -> ImpactResponse {
    let normal = outcome.impact_normal.normalize_or_zero();
    let position = outcome.impact_point + normal * tuning.impact_offset;
    let into_surface = velocity.dot(normal);

    if velocity.length() > tuning.skid_velocity_threshold {
        let mut reflected = (velocity - 2.0 * into_surface * normal) * tuning.bounce_damping;
        if reflected.z < 0.0 {
            reflected.z = reflected.z.abs();
        }

        ImpactResponse {
            position,
            velocity: reflected,
            kind: ImpactKind::Bounce,
        }
    } else {
        let sliding = (velocity - into_surface * normal) * tuning.surface_friction;

        ImpactResponse {
            position,
            velocity: sliding,
            kind: ImpactKind::Slide,
        }
    }
}
