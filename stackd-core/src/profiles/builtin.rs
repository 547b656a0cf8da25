//! Built-in stack profiles.

use super::{StackProfile, ValueSource};
use crate::types::StackKind;
use once_cell::sync::Lazy;

/// Collection of all built-in profiles.
pub static BUILTIN_PROFILES: Lazy<Vec<StackProfile>> = Lazy::new(|| {
    vec![
        // =========================================================================
        // Databases
        // =========================================================================
        StackProfile::builder(StackKind::GenericDb)
            .name("Generic database")
            .restricted_port(8080, "app")
            .restricted_port(9990, "management")
            .restricted_port(8282, "console")
            .restricted_port(7077, "scheduler")
            .restricted_port(5432, "psql")
            .restricted_port(6060, "metrics")
            .public_port(80, "http")
            .public_port(443, "https")
            .prefixed_secret("SSH_USER", "db-", 6)
            .secret("SSH_PASSWORD", 10)
            .secret("DB_ROOT_PASSWORD", 15)
            .secret("DB_NAME", 8)
            .secret("DB_USER", 5)
            .secret("DB_PASSWORD", 12)
            .disk(30)
            .flavor_family("IFinance")
            .resource_type("Database")
            .field("databaseName", ValueSource::Secret("DB_NAME".into()))
            .field("databaseUser", ValueSource::Secret("DB_USER".into()))
            .field("databasePwd", ValueSource::Secret("DB_PASSWORD".into()))
            .field("sshName", ValueSource::Secret("SSH_USER".into()))
            .field("sshPassword", ValueSource::Secret("SSH_PASSWORD".into()))
            .field("databaseUrl", ValueSource::Address)
            .build(),
        // =========================================================================
        // Serverless runtimes
        // =========================================================================
        StackProfile::builder(StackKind::ServerlessGo)
            .name("Serverless Go")
            .restricted_port(3306, "mysql")
            .restricted_port(8080, "app")
            .public_port(80, "http")
            .public_port(443, "https")
            .secret("DB_NAME", 5)
            .secret("DB_USER", 5)
            .secret("DB_PASSWORD", 10)
            .prefixed_secret("SERVER_USER", "srv-", 5)
            .secret("SERVER_PASSWORD", 10)
            .disk(15)
            .flavor_family("Lambda")
            .resource_type("Lambda")
            .field("databaseName", ValueSource::Secret("DB_NAME".into()))
            .field("databaseUser", ValueSource::Secret("DB_USER".into()))
            .field("databasePwd", ValueSource::Secret("DB_PASSWORD".into()))
            .field("databaseUrl", ValueSource::Address)
            .field("serverName", ValueSource::Secret("SERVER_USER".into()))
            .field("serverPwd", ValueSource::Secret("SERVER_PASSWORD".into()))
            .build(),
        StackProfile::builder(StackKind::ServerlessPhp)
            .name("Serverless PHP")
            .restricted_port(3306, "mysql")
            .restricted_port(8080, "app")
            .public_port(80, "http")
            .public_port(443, "https")
            .secret("DB_NAME", 8)
            .secret("DB_USER", 5)
            .secret("DB_PASSWORD", 10)
            .prefixed_secret("SERVER_USER", "srv-", 5)
            .secret("SERVER_PASSWORD", 10)
            .disk(10)
            .flavor_family("Lambda")
            .resource_type("Lambda")
            .field("databaseName", ValueSource::Secret("DB_NAME".into()))
            .field("databaseUser", ValueSource::Secret("DB_USER".into()))
            .field("databasePwd", ValueSource::Secret("DB_PASSWORD".into()))
            .field("databaseUrl", ValueSource::Address)
            .field("serverName", ValueSource::Secret("SERVER_USER".into()))
            .field("serverPwd", ValueSource::Secret("SERVER_PASSWORD".into()))
            .build(),
        // =========================================================================
        // Collaboration
        // =========================================================================
        StackProfile::builder(StackKind::Lms)
            .name("Learning management system")
            .public_port(80, "http")
            .public_port(443, "https")
            .secret("DB_PASSWORD", 10)
            .disk(50)
            .flavor_family("cloud")
            .resource_type("Moodle")
            .field("databasePwd", ValueSource::Secret("DB_PASSWORD".into()))
            .field("domain", ValueSource::Param("DOMAIN".into()))
            .field("serverUrl", ValueSource::Address)
            .build(),
        StackProfile::builder(StackKind::Meeting)
            .name("Meeting server")
            .public_port(80, "http")
            .public_port(443, "https")
            .public_port(4443, "media")
            .disk(50)
            .flavor_family("cloud")
            .resource_type("Meeting")
            .field("serverName", ValueSource::InstanceName)
            .field("domain", ValueSource::Param("DOMAIN".into()))
            .field("serverUrl", ValueSource::Address)
            .build(),
        // =========================================================================
        // Applications
        // =========================================================================
        StackProfile::builder(StackKind::GenericApp)
            .name("Generic application")
            .request_ports()
            .secret("SSH_PASSWORD_1", 10)
            .secret("SSH_PASSWORD_2", 10)
            .boot_from_volume("ssd")
            .disk(30)
            .address_labels(["public-1", "public-2"])
            .flavor_family("cloud")
            .resource_type("Application")
            .field("sshName1", ValueSource::Literal("operator".into()))
            .field("sshPassword1", ValueSource::Secret("SSH_PASSWORD_1".into()))
            .field("sshName2", ValueSource::Literal("deploy".into()))
            .field("sshPassword2", ValueSource::Secret("SSH_PASSWORD_2".into()))
            .field("databaseUrl", ValueSource::Address)
            .build(),
    ]
});
