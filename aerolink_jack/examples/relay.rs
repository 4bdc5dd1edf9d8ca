//! Relays a radio link to JACK, over UDP.
//!
//! `relay` plays whatever a peer sends. `relay tone` also sends a 440Hz test tone to
//! whichever peer it discovers.
//!
//! Set `RUST_LOG=debug` for link events.

use aerolink_jack::{
    Playback, UdpRadio,
    bridge::{
        Bridge, BridgeConfig, LinkScheduler, Outbox,
        utils::{PeriodicTimer, TickSignal},
    },
};
use core::{convert::Infallible, f32::consts::TAU, net::SocketAddrV4};
use std::sync::Arc;

const LOCAL: SocketAddrV4 = SocketAddrV4::new(core::net::Ipv4Addr::UNSPECIFIED, 6910);
const BROADCAST: SocketAddrV4 = SocketAddrV4::new(core::net::Ipv4Addr::BROADCAST, 6910);

const TONE_HZ: f32 = 440.;

/// Pushes one tick's worth of a sine wave, at a quarter of full scale.
fn push_tone(outbox: &mut Outbox, phase: &mut f32, sample_rate: u32, n_samples: usize) {
    let step = TAU * TONE_HZ / sample_rate as f32;

    // no peer draining the outbox yet
    let n_samples = n_samples.min(outbox.available() / size_of::<i16>());

    for _ in 0..n_samples {
        let sample = (phase.sin() * f32::from(i16::MAX) / 4.) as i16;
        *phase = (*phase + step) % TAU;
        outbox.push(&sample.to_le_bytes());
    }
}

fn main() -> std::io::Result<Infallible> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let tone = std::env::args().nth(1).is_some_and(|arg| arg == "tone");

    let config = BridgeConfig::default();
    let bridge = Arc::new(Bridge::new(config.clone()).map_err(std::io::Error::other)?);

    let radio = UdpRadio::bind(LOCAL, BROADCAST)?;

    let signal = Arc::new(TickSignal::new());
    let (mut scheduler, mut outbox) =
        LinkScheduler::new(Arc::clone(&bridge), radio.try_clone()?, Arc::clone(&signal));

    let _timer = if tone {
        let sample_rate = config.format.sample_rate;
        let per_tick = (config.format.bytes_per_millis(1) / size_of::<i16>()).max(1);
        let mut phase = 0.;

        PeriodicTimer::spawn(config.tick_period, move || {
            push_tone(&mut outbox, &mut phase, sample_rate, per_tick);
            signal.notify();
        })?
    } else {
        PeriodicTimer::notifying(config.tick_period, signal)?
    };

    std::thread::Builder::new()
        .name("aerolink-scheduler".into())
        .spawn(move || scheduler.run())?;

    let _playback = Playback::start(
        "aerolink",
        Arc::clone(&bridge),
        2.try_into().unwrap(),
        config.streaming,
    )
    .map_err(std::io::Error::other)?;

    radio.run(&*bridge)
}
