//! Ingests a capture file spec and prints a summary of the reconstructed
//! conversations, one line per conversation. Useful for eyeballing a trace
//! while working on the engine; not part of the crate's public API.

use clap::Parser;

#[derive(Parser)]
#[command(about = "Summarize TCP/UDP conversations reconstructed from a capture file spec")]
struct Args {
    /// File spec to ingest, e.g. "captures/*.pcapng"
    file_spec: String,

    /// Print every frame in each conversation instead of just the summary line.
    #[arg(long)]
    verbose: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let store = match sqltrace_core::run(&args.file_spec) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    println!("{} files, {} conversations, {} frames", store.files().len(), store.conversations().len(), store.frames().len());

    for (idx, conv) in store.conversations().iter().enumerate() {
        println!(
            "#{idx} {}:{} -> {}:{} {} frames={} bytes={} syn={} fin={} rst={} push={} retransmits={}/{} continuations={}",
            conv.src_ip,
            conv.src_port,
            conv.dst_ip,
            conv.dst_port,
            if conv.is_udp { "udp" } else { "tcp" },
            conv.source_frames + conv.dest_frames,
            conv.total_bytes,
            conv.syn_count,
            conv.fin_count,
            conv.rst_count,
            conv.push_count,
            conv.raw_retransmits,
            conv.sig_retransmits,
            conv.frames.iter().filter(|&&id| store.frame(id).is_continuation).count(),
        );

        if args.verbose {
            for &frame_id in &conv.frames {
                let frame = store.frame(frame_id);
                println!(
                    "    #{} tick={} from_client={} payload={}B retransmit={} continuation={}",
                    frame.number,
                    frame.tick.as_i64(),
                    frame.is_from_client,
                    frame.payload_len(),
                    frame.is_retransmit,
                    frame.is_continuation,
                );
            }
        }
    }
}
