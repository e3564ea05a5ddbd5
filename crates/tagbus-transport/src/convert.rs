//! Conversions between the generated protobuf types and `tagbus-core`'s
//! wire-agnostic value types.

use tagbus_core::{AssignedTag, Quality, TagEnvelope, TagRole, TagValue};

use crate::error::TransportError;
use crate::pb;

impl From<TagValue> for pb::TagValue {
    fn from(value: TagValue) -> Self {
        let kind = match value {
            TagValue::Bool(b) => pb::tag_value::Kind::BoolValue(b),
            TagValue::Int(i) => pb::tag_value::Kind::IntValue(i),
            TagValue::Float(f) => pb::tag_value::Kind::FloatValue(f),
            TagValue::Text(s) => pb::tag_value::Kind::TextValue(s),
            TagValue::Bytes(b) => pb::tag_value::Kind::BytesValue(b),
        };
        pb::TagValue { kind: Some(kind) }
    }
}

impl TryFrom<pb::TagValue> for TagValue {
    type Error = TransportError;

    fn try_from(value: pb::TagValue) -> Result<Self, Self::Error> {
        match value.kind {
            Some(pb::tag_value::Kind::BoolValue(b)) => Ok(TagValue::Bool(b)),
            Some(pb::tag_value::Kind::IntValue(i)) => Ok(TagValue::Int(i)),
            Some(pb::tag_value::Kind::FloatValue(f)) => Ok(TagValue::Float(f)),
            Some(pb::tag_value::Kind::TextValue(s)) => Ok(TagValue::Text(s)),
            Some(pb::tag_value::Kind::BytesValue(b)) => Ok(TagValue::Bytes(b)),
            None => Err(TransportError::MissingField("TagValue.kind")),
        }
    }
}

impl From<Quality> for pb::Quality {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Unknown => pb::Quality::Unknown,
            Quality::Good => pb::Quality::Good,
            Quality::Bad => pb::Quality::Bad,
        }
    }
}

impl From<pb::Quality> for Quality {
    fn from(quality: pb::Quality) -> Self {
        match quality {
            pb::Quality::Unknown => Quality::Unknown,
            pb::Quality::Good => Quality::Good,
            pb::Quality::Bad => Quality::Bad,
        }
    }
}

impl TryFrom<TagEnvelope> for pb::TagEnvelope {
    type Error = TransportError;

    fn try_from(envelope: TagEnvelope) -> Result<Self, Self::Error> {
        Ok(pb::TagEnvelope {
            handle: envelope.handle,
            value: Some(envelope.value.into()),
            timestamp_ms: envelope.timestamp_ms,
            quality: pb::Quality::from(envelope.quality) as i32,
            source: envelope.source,
        })
    }
}

impl TryFrom<pb::TagEnvelope> for TagEnvelope {
    type Error = TransportError;

    fn try_from(envelope: pb::TagEnvelope) -> Result<Self, Self::Error> {
        let value = envelope
            .value
            .ok_or(TransportError::MissingField("TagEnvelope.value"))?
            .try_into()?;
        let quality = pb::Quality::try_from(envelope.quality).unwrap_or(pb::Quality::Unknown);
        Ok(TagEnvelope {
            handle: envelope.handle,
            value,
            timestamp_ms: envelope.timestamp_ms,
            quality: quality.into(),
            source: envelope.source,
        })
    }
}

impl From<TagRole> for pb::Role {
    fn from(role: TagRole) -> Self {
        match role {
            TagRole::Producer => pb::Role::Producer,
            TagRole::Consumer => pb::Role::Consumer,
        }
    }
}

impl From<pb::Role> for TagRole {
    fn from(role: pb::Role) -> Self {
        match role {
            pb::Role::Producer => TagRole::Producer,
            pb::Role::Consumer => TagRole::Consumer,
        }
    }
}

impl From<AssignedTag> for pb::AssignedTag {
    fn from(tag: AssignedTag) -> Self {
        pb::AssignedTag {
            tag_path: tag.tag_path,
            role: pb::Role::from(tag.role) as i32,
            handle: tag.handle,
            source_plugin_instance_id: tag.source_plugin_instance_id,
            reference_plugin_instance_id: tag.reference_plugin_instance_id,
        }
    }
}

impl From<pb::AssignedTag> for AssignedTag {
    fn from(tag: pb::AssignedTag) -> Self {
        let role = pb::Role::try_from(tag.role).unwrap_or(pb::Role::Producer).into();
        AssignedTag {
            tag_path: tag.tag_path,
            role,
            handle: tag.handle,
            source_plugin_instance_id: tag.source_plugin_instance_id,
            reference_plugin_instance_id: tag.reference_plugin_instance_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_missing_kind_is_a_missing_field_error() {
        let err = TagValue::try_from(pb::TagValue { kind: None }).unwrap_err();
        assert!(matches!(err, TransportError::MissingField("TagValue.kind")));
    }

    #[test]
    fn tag_envelope_missing_value_is_a_missing_field_error() {
        let wire = pb::TagEnvelope {
            handle: 1,
            value: None,
            timestamp_ms: 0,
            quality: pb::Quality::Good as i32,
            source: "p1".into(),
        };
        let err = TagEnvelope::try_from(wire).unwrap_err();
        assert!(matches!(err, TransportError::MissingField("TagEnvelope.value")));
    }

    #[test]
    fn unrecognized_wire_quality_falls_back_to_unknown() {
        let wire = pb::TagEnvelope {
            handle: 1,
            value: Some(TagValue::Int(5).into()),
            timestamp_ms: 0,
            quality: 99,
            source: "p1".into(),
        };
        let envelope = TagEnvelope::try_from(wire).unwrap();
        assert_eq!(envelope.quality, Quality::Unknown);
    }

    #[test]
    fn assigned_tag_round_trips_through_the_wire() {
        let original = AssignedTag {
            tag_path: "plant/line1/remote".into(),
            role: TagRole::Producer,
            handle: 7,
            source_plugin_instance_id: "remote-device".into(),
            reference_plugin_instance_id: "gateway".into(),
        };
        let wire = pb::AssignedTag::from(original.clone());
        assert_eq!(AssignedTag::from(wire), original);
    }

    #[test]
    fn role_round_trips_through_the_wire_enum() {
        assert_eq!(TagRole::from(pb::Role::from(TagRole::Producer)), TagRole::Producer);
        assert_eq!(TagRole::from(pb::Role::from(TagRole::Consumer)), TagRole::Consumer);
    }
}
