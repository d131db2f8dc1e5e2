//! Benchmark session throughput: events in, fragments out.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use livemux_common::{AudioCodec, AudioTrackInfo, Frame, VideoCodec, VideoTrackInfo};
use livemux_media::fmp4::Fragment;
use livemux_media::{SessionEvent, SessionFactory};

fn video_frames(count: u32, size: usize) -> Vec<SessionEvent> {
    let payload = Bytes::from(vec![0x41; size]);
    (0..count)
        .map(|i| {
            SessionEvent::VideoFrame(Frame::new(i * 40, 40, payload.clone(), i % 50 == 0))
        })
        .collect()
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    // 60 seconds of 25 fps video with 20 KB access units.
    let frames = video_frames(1500, 20_000);
    group.bench_function("video_60s_25fps", |b| {
        b.iter(|| {
            let mut session = SessionFactory::default().create("bench");
            let mut out: Vec<Bytes> = Vec::new();
            session
                .handle(
                    SessionEvent::VideoTrack(VideoTrackInfo::new(VideoCodec::Av1, vec![])),
                    &mut out,
                )
                .unwrap();
            session.handle(SessionEvent::Attached, &mut out).unwrap();
            for event in frames.iter().cloned() {
                session.handle(event, &mut out).unwrap();
            }
            black_box(out.len())
        });
    });

    // 60 seconds of 20 ms G.711 frames.
    let audio: Vec<SessionEvent> = (0..3000)
        .map(|i| SessionEvent::AudioFrame(Frame::new(i * 20, 20, vec![0xD5; 160], true)))
        .collect();
    group.bench_function("pcmu_60s_20ms", |b| {
        b.iter(|| {
            let mut session = SessionFactory::default().create("bench");
            let mut out: Vec<Bytes> = Vec::new();
            session
                .handle(
                    SessionEvent::AudioTrack(AudioTrackInfo::g711(AudioCodec::Pcmu, 8000, 1)),
                    &mut out,
                )
                .unwrap();
            session.handle(SessionEvent::Attached, &mut out).unwrap();
            for event in audio.iter().cloned() {
                session.handle(event, &mut out).unwrap();
            }
            black_box(out.len())
        });
    });

    group.finish();
}

fn bench_fragment_encode(c: &mut Criterion) {
    let mut fragment = Fragment::new(1, 1);
    for i in 0..25 {
        fragment.add_full_sample(i * 40, 40, Bytes::from(vec![0x41; 20_000]), i == 0);
    }
    c.bench_function("fragment_encode_25x20k", |b| {
        b.iter(|| black_box(fragment.encode().unwrap()));
    });
}

criterion_group!(benches, bench_session, bench_fragment_encode);
criterion_main!(benches);
