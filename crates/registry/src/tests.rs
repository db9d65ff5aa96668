//! Tests which aren't associated with a single component.
use std::any::type_name;

use bytes::{Buf, BufMut};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use crate::*;

struct TestProtocol;

impl Protocol for TestProtocol {
    type InitiatorContext = Vec<String>;
    type ResponderContext = Vec<(PeerId, String)>;
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Chat {
    text: String,
}

impl ToResponder<TestProtocol> for Chat {
    fn handle(self: Box<Self>, ctx: &mut Vec<(PeerId, String)>, sender: PeerId) -> anyhow::Result<()> {
        ctx.push((sender, self.text));
        Ok(())
    }
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Blob(Vec<u8>);

impl ToInitiator<TestProtocol> for Blob {
    fn handle(self: Box<Self>, ctx: &mut Vec<String>) -> anyhow::Result<()> {
        ctx.push(format!("blob of {}", self.0.len()));
        Ok(())
    }
}

/// Hand-encoded, to get coverage on boundary values through a non-serde codec.
#[derive(Debug, PartialEq)]
struct Limits {
    small: u8,
    signed: i64,
    unsigned: u64,
    float: f32,
}

impl ToInitiator<TestProtocol> for Limits {
    fn handle(self: Box<Self>, ctx: &mut Vec<String>) -> anyhow::Result<()> {
        ctx.push(format!("{:?}", self));
        Ok(())
    }
}

fn encode_limits(l: &Limits, dest: &mut Vec<u8>) -> Result<(), SerializerError> {
    dest.put_u8(l.small);
    dest.put_i64(l.signed);
    dest.put_u64(l.unsigned);
    dest.put_f32(l.float);
    Ok(())
}

fn decode_limits(source: &mut &[u8]) -> Result<Limits, SerializerError> {
    ensure_remaining(source, 21)?;
    Ok(Limits {
        small: source.get_u8(),
        signed: source.get_i64(),
        unsigned: source.get_u64(),
        float: source.get_f32(),
    })
}

/// Lots of distinct types, for testing id assignment.
#[derive(Debug, PartialEq)]
struct Numbered<const A: usize, const B: usize>(u32);

impl<const A: usize, const B: usize> ToResponder<TestProtocol> for Numbered<A, B> {
    fn handle(self: Box<Self>, ctx: &mut Vec<(PeerId, String)>, sender: PeerId) -> anyhow::Result<()> {
        ctx.push((sender, format!("{}/{}/{}", A, B, self.0)));
        Ok(())
    }
}

fn encode_numbered<const A: usize, const B: usize>(
    m: &Numbered<A, B>,
    dest: &mut Vec<u8>,
) -> Result<(), SerializerError> {
    dest.put_u32(m.0);
    Ok(())
}

fn decode_numbered<const A: usize, const B: usize>(
    source: &mut &[u8],
) -> Result<Numbered<A, B>, SerializerError> {
    ensure_remaining(source, 4)?;
    Ok(Numbered(source.get_u32()))
}

fn numbered_serializer<const A: usize, const B: usize>() -> FnSerializer<Numbered<A, B>> {
    FnSerializer::new(encode_numbered::<A, B>, decode_numbered::<A, B>)
}

type Builder = RegistryBuilder<TestProtocol>;

fn register_numbered<const A: usize, const B: usize>(
    b: &mut Builder,
) -> Result<(MessageId, &'static str), ConfigError> {
    let id = b.register_to_responder_with::<Numbered<A, B>>("c", numbered_serializer::<A, B>())?;
    Ok((id, type_name::<Numbered<A, B>>()))
}

type RegisterFn = fn(&mut Builder) -> Result<(MessageId, &'static str), ConfigError>;

fn registrations() -> Vec<RegisterFn> {
    vec![
        register_numbered::<0, 0>,
        register_numbered::<0, 1>,
        register_numbered::<0, 2>,
        register_numbered::<0, 3>,
        register_numbered::<1, 0>,
        register_numbered::<1, 1>,
        register_numbered::<1, 2>,
        register_numbered::<1, 3>,
    ]
}

fn standard_builder() -> Builder {
    let mut b = Builder::new();
    b.declare_channel("chat").unwrap();
    b.declare_channel("bulk").unwrap();
    b.register_to_responder_with::<Chat>("chat", BincodeSerializer::default())
        .unwrap();
    b.register_to_initiator_with::<Blob>("bulk", BincodeSerializer::default())
        .unwrap();
    b.register_to_initiator_with::<Limits>("bulk", FnSerializer::new(encode_limits, decode_limits))
        .unwrap();
    b
}

proptest! {
    #[test]
    fn ids_follow_registration_order(
        order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle(),
        take in 1..=8usize,
    ) {
        let regs = registrations();
        let mut b = Builder::new();
        b.declare_channel("c").unwrap();

        let mut names = vec![];
        for (expected, i) in order.iter().take(take).enumerate() {
            let (id, name) = regs[*i](&mut b).unwrap();
            prop_assert_eq!(id, MessageId(expected as u8));
            names.push(name);
        }

        // The other direction has its own id space.
        let blob = b.register_to_initiator_with::<Blob>("c", BincodeSerializer::default()).unwrap();
        prop_assert_eq!(blob, MessageId(0));

        let reg = b.build();
        let listed = reg
            .messages()
            .message_types("c", Direction::ToResponder)
            .unwrap()
            .into_iter()
            .map(|m| m.name())
            .collect::<Vec<_>>();
        prop_assert_eq!(&listed, &names);

        for (i, name) in names.iter().enumerate() {
            let mt = reg.messages().resolve_type("c", Direction::ToResponder, MessageId(i as u8)).unwrap();
            prop_assert_eq!(mt.name(), *name);
            prop_assert_eq!(mt.direction(), Direction::ToResponder);
            prop_assert_eq!(reg.messages().resolve_id_by_name(name).unwrap().id(), MessageId(i as u8));
        }

        let unused = MessageId(names.len() as u8);
        let is_unknown = matches!(
            reg.messages().resolve_type("c", Direction::ToResponder, unused),
            Err(DesyncError::UnknownMessageId { .. })
        );
        prop_assert!(is_unknown);
    }
}

#[test]
fn duplicate_registration_keeps_the_original() {
    courier_logging::log_to_stderr();

    let mut b = standard_builder();
    assert!(matches!(
        b.register_to_responder::<Chat>("chat"),
        Err(ConfigError::DuplicateMessageType(_))
    ));
    assert!(matches!(
        b.register_to_responder::<Chat>("bulk"),
        Err(ConfigError::DuplicateMessageType(_))
    ));
    // Through the binding shorthand too, which must not blame the serializer.
    assert!(matches!(
        b.register_to_responder_with::<Chat>("chat", BincodeSerializer::default()),
        Err(ConfigError::DuplicateMessageType(_))
    ));
    assert!(matches!(
        b.register_to_initiator_with::<Blob>("bulk", BincodeSerializer::default()),
        Err(ConfigError::DuplicateMessageType(_))
    ));

    let reg = b.build();
    let chat = reg.messages().resolve_id::<Chat>().unwrap();
    assert_eq!(chat.channel(), "chat");
    assert_eq!(chat.id(), MessageId(0));
    assert!(reg
        .messages()
        .message_types("bulk", Direction::ToResponder)
        .unwrap()
        .is_empty());
}

#[test]
fn configuration_errors() {
    let mut b = standard_builder();
    assert!(matches!(
        b.declare_channel("chat"),
        Err(ConfigError::DuplicateChannel(_))
    ));
    assert!(matches!(
        b.declare_channel(""),
        Err(ConfigError::EmptyChannelName)
    ));

    // No serializer bound yet.
    assert!(matches!(
        b.register_to_responder::<Numbered<9, 9>>("chat"),
        Err(ConfigError::MissingSerializer(_))
    ));

    b.bind_serializer(numbered_serializer::<9, 9>()).unwrap();
    assert!(matches!(
        b.register_to_responder::<Numbered<9, 9>>("nope"),
        Err(ConfigError::UnknownChannel(_))
    ));
    assert_eq!(
        b.register_to_responder::<Numbered<9, 9>>("chat").unwrap(),
        MessageId(1)
    );

    let reg = b.build();
    assert!(matches!(
        reg.messages().resolve_id::<String>(),
        Err(ConfigError::UnregisteredMessageType(_))
    ));
    assert_eq!(
        reg.messages().iter_channels().collect::<Vec<_>>(),
        vec!["chat", "bulk"]
    );
}

fn register_row<const A: usize>(b: &mut Builder) -> Result<(), ConfigError> {
    macro_rules! each {
        ($b:ident; $($n:literal)*) => {
            $( $b.register_to_responder_with::<Numbered<A, $n>>("wide", numbered_serializer::<A, $n>())?; )*
        };
    }
    each!(b; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);
    Ok(())
}

#[test]
fn id_space_is_one_byte() {
    let mut b = Builder::new();
    b.declare_channel("wide").unwrap();

    macro_rules! rows {
        ($b:ident; $($a:literal)*) => {
            $( register_row::<$a>(&mut $b).unwrap(); )*
        };
    }
    rows!(b; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);

    let res = b.register_to_responder_with::<Numbered<16, 0>>("wide", numbered_serializer::<16, 0>());
    assert!(matches!(
        res,
        Err(ConfigError::IdSpaceExhausted {
            direction: Direction::ToResponder,
            ..
        })
    ));

    // Which doesn't stop the other direction.
    assert_eq!(
        b.register_to_initiator_with::<Blob>("wide", BincodeSerializer::default())
            .unwrap(),
        MessageId(0)
    );

    let reg = b.build();
    let last = reg
        .messages()
        .resolve_type("wide", Direction::ToResponder, MessageId(255))
        .unwrap();
    assert_eq!(last.name(), type_name::<Numbered<15, 15>>());
}

#[test]
fn responder_round_trip() {
    let reg = standard_builder().build();

    for text in [String::new(), "hello".to_string(), "x".repeat(1 << 16)] {
        let mut buf = vec![];
        let mt = reg.encode(&Chat { text: text.clone() }, &mut buf).unwrap();
        assert_eq!(mt.name(), type_name::<Chat>());
        assert_eq!(buf[0], 0);

        let decoded = reg.decode_to_responder("chat", &buf).unwrap();
        assert_eq!(decoded.message_type.name(), type_name::<Chat>());

        let mut ctx = vec![];
        decoded.message.handle(&mut ctx, PeerId(3)).unwrap();
        assert_eq!(ctx, vec![(PeerId(3), text)]);
    }
}

#[test]
fn initiator_round_trip() {
    let reg = standard_builder().build();

    let limits = [
        Limits {
            small: 0,
            signed: i64::MIN,
            unsigned: 0,
            float: f32::MIN,
        },
        Limits {
            small: u8::MAX,
            signed: i64::MAX,
            unsigned: u64::MAX,
            float: f32::MAX,
        },
    ];

    for l in limits {
        let mut buf = vec![];
        reg.encode(&l, &mut buf).unwrap();
        assert_eq!(buf.len(), 22);
        assert_eq!(buf[0], 1);

        let decoded = reg.decode_to_initiator("bulk", &buf).unwrap();
        let mut ctx = vec![];
        decoded.message.handle(&mut ctx).unwrap();
        assert_eq!(ctx, vec![format!("{:?}", l)]);
    }

    for len in [0, 1, 1 << 20] {
        let mut buf = vec![];
        reg.encode(&Blob(vec![0xab; len]), &mut buf).unwrap();
        assert_eq!(buf[0], 0);

        let mut ctx = vec![];
        reg.decode_to_initiator("bulk", &buf)
            .unwrap()
            .message
            .handle(&mut ctx)
            .unwrap();
        assert_eq!(ctx, vec![format!("blob of {}", len)]);
    }
}

#[test]
fn desynchronization() {
    let reg = standard_builder().build();

    assert!(matches!(
        reg.decode_to_responder("chat", &[]),
        Err(DesyncError::EmptyEnvelope { .. })
    ));
    assert!(matches!(
        reg.decode_to_responder("chat", &[1]),
        Err(DesyncError::UnknownMessageId {
            id: MessageId(1),
            direction: Direction::ToResponder,
            ..
        })
    ));
    assert!(matches!(
        reg.decode_to_responder("elsewhere", &[0]),
        Err(DesyncError::UnknownChannel(_))
    ));

    // Right id, wrong direction: nothing is registered to-responder on bulk.
    assert!(matches!(
        reg.decode_to_responder("bulk", &[0]),
        Err(DesyncError::UnknownMessageId { .. })
    ));

    // Limits needs 21 bytes.
    assert!(matches!(
        reg.decode_to_initiator("bulk", &[1, 0, 0]),
        Err(DesyncError::Payload { .. })
    ));

    let mut buf = vec![];
    reg.encode(&Limits {
        small: 1,
        signed: 2,
        unsigned: 3,
        float: 4.0,
    }, &mut buf)
    .unwrap();
    buf.push(0);
    assert!(matches!(
        reg.decode_to_initiator("bulk", &buf),
        Err(DesyncError::TrailingBytes { remaining: 1, .. })
    ));
}

#[test]
fn unregistered_types_do_not_encode() {
    let reg = standard_builder().build();
    let mut buf = vec![7];
    assert!(matches!(
        reg.encode(&Numbered::<3, 3>(1), &mut buf),
        Err(Error::Config(ConfigError::UnregisteredMessageType(_)))
    ));
    assert_eq!(buf, vec![7]);
}

#[test]
fn registry_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Registry<TestProtocol>>();

    let reg = standard_builder().build_shared();
    reg.messages().log_summary();

    let threads = (0..4u64)
        .map(|i| {
            let reg = reg.clone();
            std::thread::spawn(move || {
                let mut buf = vec![];
                reg.encode(&Chat { text: i.to_string() }, &mut buf).unwrap();
                let mut ctx = vec![];
                reg.decode_to_responder("chat", &buf)
                    .unwrap()
                    .message
                    .handle(&mut ctx, PeerId(i))
                    .unwrap();
                ctx
            })
        })
        .collect::<Vec<_>>();

    for (i, t) in threads.into_iter().enumerate() {
        assert_eq!(t.join().unwrap(), vec![(PeerId(i as u64), i.to_string())]);
    }
}
