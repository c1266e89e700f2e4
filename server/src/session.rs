use relay_shared::protocol::{round4, PlayerWire, Rotation, TransformUpdate};
use relay_shared::vec3::Vec3;

/// Last-known state of one connected client. Mutated only by messages
/// arriving on that client's own connection.
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    /// Display name; empty until the client sends one.
    pub name: String,
    pub position: Vec3,
    pub rotation: Rotation,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl ClientSession {
    /// Merge a partial transform report. Absent fields keep their previous
    /// value; fields carrying NaN/infinite components are dropped on their
    /// own without affecting the rest of the update.
    pub fn apply(&mut self, update: TransformUpdate) {
        if let Some(position) = update.position.filter(Vec3::is_finite) {
            self.position = position;
        }
        if let Some(rotation) = update.rotation.filter(Rotation::is_finite) {
            self.rotation = rotation;
        }
        if let Some(velocity) = update.linear_velocity.filter(Vec3::is_finite) {
            self.linear_velocity = velocity;
        }
        if let Some(velocity) = update.angular_velocity.filter(Vec3::is_finite) {
            self.angular_velocity = velocity;
        }
    }

    pub fn to_wire(&self) -> PlayerWire {
        PlayerWire {
            position: round_vec(self.position),
            rotation: round_rotation(self.rotation),
            linear_velocity: round_vec(self.linear_velocity),
            angular_velocity: round_vec(self.angular_velocity),
            name: if self.name.is_empty() {
                None
            } else {
                Some(self.name.clone())
            },
        }
    }
}

fn round_vec(v: Vec3) -> Vec3 {
    Vec3::new(round4(v.x), round4(v.y), round4(v.z))
}

fn round_rotation(r: Rotation) -> Rotation {
    Rotation {
        x: round4(r.x),
        y: round4(r.y),
        z: round4(r.z),
        w: r.w.map(round4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_update() -> TransformUpdate {
        TransformUpdate {
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: Some(Rotation {
                x: 0.1,
                y: 0.2,
                z: 0.3,
                w: None,
            }),
            linear_velocity: Some(Vec3::new(4.0, 5.0, 6.0)),
            angular_velocity: Some(Vec3::new(7.0, 8.0, 9.0)),
        }
    }

    #[test]
    fn apply_merges_all_present_fields() {
        let mut session = ClientSession::default();
        session.apply(full_update());
        assert_eq!(session.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(session.linear_velocity, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(session.angular_velocity, Vec3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn absent_fields_keep_previous_values() {
        let mut session = ClientSession::default();
        session.apply(full_update());

        session.apply(TransformUpdate {
            linear_velocity: Some(Vec3::new(-1.0, 0.0, 0.0)),
            ..Default::default()
        });

        assert_eq!(session.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(session.rotation.x, 0.1);
        assert_eq!(session.linear_velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(session.angular_velocity, Vec3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn non_finite_field_is_dropped_others_still_apply() {
        let mut session = ClientSession::default();
        session.apply(full_update());

        session.apply(TransformUpdate {
            position: Some(Vec3::new(f64::NAN, 0.0, 0.0)),
            linear_velocity: Some(Vec3::zero()),
            ..Default::default()
        });

        assert_eq!(session.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(session.linear_velocity, Vec3::zero());
    }

    #[test]
    fn wire_entry_omits_empty_name() {
        let session = ClientSession::default();
        assert_eq!(session.to_wire().name, None);

        let named = ClientSession {
            name: "Bob".to_string(),
            ..Default::default()
        };
        assert_eq!(named.to_wire().name.as_deref(), Some("Bob"));
    }

    #[test]
    fn wire_entry_rounds_components() {
        let mut session = ClientSession::default();
        session.apply(TransformUpdate {
            position: Some(Vec3::new(1.23456789, 0.0, 0.0)),
            rotation: Some(Rotation {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: Some(0.70710678),
            }),
            ..Default::default()
        });
        let wire = session.to_wire();
        assert_eq!(wire.position.x, 1.2346);
        assert_eq!(wire.rotation.w, Some(0.7071));
    }
}
