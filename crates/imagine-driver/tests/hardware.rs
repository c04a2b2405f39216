//! On-target tests
//!
//! Run on a board with the IMAGine IP exposed through UIO:
//!
//! ```text
//! IMAGINE_DEVICE=/dev/uio0 cargo test -p imagine-driver --test hardware -- --ignored
//! ```

use imagine_chip::regs;
use imagine_driver::mmio::default_device_path;
use imagine_driver::prelude::*;
use std::time::Duration;

fn open() -> FifoTransport<MmioPort> {
    let port = MmioPort::map(default_device_path(), 0).expect("map IMAGine registers");
    FifoTransport::new(port).with_poll(PollConfig::unbounded().with_deadline(Duration::from_secs(1)))
}

#[test]
#[ignore] // Requires hardware
fn reset_leaves_output_empty() {
    let mut fifo = open();
    fifo.reset_fifos();
    assert_eq!(fifo.pop_sample(), Sample::Empty);
    let status = fifo.port_mut().read(regs::FIFO_STATUS);
    assert_eq!(status & regs::fifo_status::FINP_FULL, 0);
}

#[test]
#[ignore] // Requires hardware
fn load_every_register() {
    let mut fifo = open();
    fifo.reset_fifos();
    let params = EngineParams::default();
    let loader = VectorLoader::new(params);
    let values: Vec<i16> = (0..64).map(|i| i * 3 - 90).collect();

    for reg in 0..params.register_count() {
        let n = loader.load_vector_row(&mut fifo, reg, &values).unwrap();
        assert!(n > params.reg_width());
    }
    println!("{} words pushed", fifo.instructions_pushed());
}

#[test]
#[ignore] // Requires hardware
fn eov_clears() {
    let mut fifo = open();
    fifo.clear_end_of_vector();
    assert!(!fifo.is_end_of_vector());
}
