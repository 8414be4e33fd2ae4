use crate::types::EntityKind;

/// A single schema failure, produced by [`crate::OptionsSchema::resolve`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("required option '{0}' is missing")]
    MissingRequired(String),

    #[error("option '{key}' does not exist (defined options: {defined})")]
    Undefined { key: String, defined: String },

    #[error("option '{key}' expected type {expected}, got {actual}")]
    InvalidType {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("option '{key}' has rejected value {value}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("option '{key}' could not be normalized: {reason}")]
    Normalization { key: String, reason: String },
}

/// Coarse classification of [`ConfigError`], matching who is expected to act
/// on the failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input data. Fatal to the compile.
    Configuration,
    /// Query-time lookup miss; callers may recover via `find_optional`.
    NotFound,
    /// Programming or authoring bug (cycles, namespace mismatch).
    Logic,
    /// An implicit behavior attachment could not be configured.
    AutoAttachment,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {kind} configuration '{name}': {source}")]
    Invalid {
        kind: EntityKind,
        name: String,
        #[source]
        source: SchemaViolation,
    },

    #[error("Resource '{resource}': invalid options for {kind} '{name}': {source}")]
    AttachmentInvalid {
        resource: String,
        kind: EntityKind,
        name: String,
        #[source]
        source: SchemaViolation,
    },

    #[error("Invalid {kind} identifier '{key}': neither a valid name nor a registered type")]
    InvalidIdentifier { kind: EntityKind, key: String },

    #[error("{kind} '{name}' references unknown {reference_kind} '{reference}'")]
    UnknownReference {
        kind: EntityKind,
        name: String,
        reference_kind: EntityKind,
        reference: String,
    },

    #[error("Resource '{resource}' requires unknown permission '{permission}'")]
    UnknownPermission {
        resource: String,
        permission: String,
    },

    #[error("{kind} key '{key}' resolves to name '{name}', which another entry already uses")]
    DuplicateName {
        kind: EntityKind,
        name: String,
        key: String,
    },

    #[error("{kind} '{name}' failed to expand: {reason}")]
    Expansion {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error(
        "Resource '{resource}': class '{entity}' implements '{interface}' but behavior \
         '{behavior}' cannot be auto-configured ({reason}); configure it explicitly"
    )]
    AutoAttach {
        resource: String,
        entity: String,
        interface: String,
        behavior: String,
        reason: String,
    },

    #[error("Failed to construct {kind} configuration '{name}': {reason}")]
    Construct {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("No {kind} configuration found for '{name}'")]
    NotFound { kind: EntityKind, name: String },

    #[error("Resource parent cycle detected at '{resource}': {}", .chain.join(" -> "))]
    ParentCycle { resource: String, chain: Vec<String> },

    #[error(
        "Resource '{child}' (namespace '{child_namespace}') is a child of '{parent}' \
         (namespace '{parent_namespace}') across namespaces"
    )]
    NamespaceMismatch {
        parent: String,
        child: String,
        parent_namespace: String,
        child_namespace: String,
    },

    #[error("Resource registry was dropped while a configuration still referenced it")]
    RegistryDropped,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub fn invalid(kind: EntityKind, name: impl Into<String>, source: SchemaViolation) -> Self {
        Self::Invalid {
            kind,
            name: name.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Invalid { .. }
            | Self::AttachmentInvalid { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DuplicateName { .. }
            | Self::UnknownReference { .. }
            | Self::UnknownPermission { .. }
            | Self::Expansion { .. }
            | Self::Construct { .. } => ErrorCategory::Configuration,
            Self::AutoAttach { .. } => ErrorCategory::AutoAttachment,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::ParentCycle { .. } | Self::NamespaceMismatch { .. } | Self::RegistryDropped => {
                ErrorCategory::Logic
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_invalid_with_source_chain() {
        let err = ConfigError::invalid(
            EntityKind::Resource,
            "acme.post",
            SchemaViolation::MissingRequired("entity".into()),
        );
        assert_eq!(
            err.to_string(),
            "Invalid resource configuration 'acme.post': required option 'entity' is missing"
        );
        let source = err.source().expect("invalid error should have source");
        assert_eq!(source.to_string(), "required option 'entity' is missing");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_display_unknown_reference() {
        let err = ConfigError::UnknownReference {
            kind: EntityKind::Resource,
            name: "acme.post".into(),
            reference_kind: EntityKind::Namespace,
            reference: "blog".into(),
        };
        assert_eq!(
            err.to_string(),
            "resource 'acme.post' references unknown namespace 'blog'"
        );
    }

    #[test]
    fn test_display_unknown_permission() {
        let err = ConfigError::UnknownPermission {
            resource: "report".into(),
            permission: "export".into(),
        };
        assert_eq!(
            err.to_string(),
            "Resource 'report' requires unknown permission 'export'"
        );
    }

    #[test]
    fn test_display_duplicate_name() {
        let err = ConfigError::DuplicateName {
            kind: EntityKind::Resource,
            name: "acme.post".into(),
            key: "acme.Post".into(),
        };
        assert_eq!(
            err.to_string(),
            "resource key 'acme.Post' resolves to name 'acme.post', which another entry already uses"
        );
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_display_parent_cycle() {
        let err = ConfigError::ParentCycle {
            resource: "a".into(),
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Resource parent cycle detected at 'a': a -> b -> a"
        );
        assert_eq!(err.category(), ErrorCategory::Logic);
    }

    #[test]
    fn test_auto_attach_message_tells_operator_to_configure() {
        let err = ConfigError::AutoAttach {
            resource: "acme.post".into(),
            entity: "acme::Post".into(),
            interface: "acme::Auditable".into(),
            behavior: "audit".into(),
            reason: "required option 'channel' is missing".into(),
        };
        let message = err.to_string();
        assert!(message.contains("implements 'acme::Auditable'"));
        assert!(message.contains("configure it explicitly"));
        assert_eq!(err.category(), ErrorCategory::AutoAttachment);
    }

    #[test]
    fn test_not_found_is_recoverable_category() {
        let err = ConfigError::NotFound {
            kind: EntityKind::Permission,
            name: "missing".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No permission configuration found for 'missing'");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
    }
}
