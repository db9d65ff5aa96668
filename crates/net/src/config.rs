use courier_framer::Role;

/// Compatibility token used unless configured otherwise.
pub const DEFAULT_COMPATIBILITY_TOKEN: &str = "0";

#[derive(derivative::Derivative, derive_builder::Builder, Debug, Clone)]
#[derivative(Default)]
#[builder(default)]
pub struct NetworkConfig {
    /// Which side of the protocol this endpoint plays.
    #[derivative(Default(value = "Role::Initiator"))]
    role: Role,

    /// Compared literally against the peer's token whenever a channel opens; any difference refuses the channel.
    ///
    /// Bump this whenever the registry changes in a way old peers can't decode.
    #[derivative(Default(value = "DEFAULT_COMPATIBILITY_TOKEN.to_string()"))]
    #[builder(setter(into))]
    compatibility_token: String,

    /// Largest envelope, id byte included, which we will hand to the transport.
    #[derivative(Default(value = "1 << 20"))]
    max_envelope_size: usize,
}

impl NetworkConfig {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn compatibility_token(&self) -> &str {
        &self.compatibility_token
    }

    pub fn max_envelope_size(&self) -> usize {
        self.max_envelope_size
    }
}
