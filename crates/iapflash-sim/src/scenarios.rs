//! Engine behaviour against the simulated controller

use iapflash_core::controller::FlashController;
use iapflash_core::error::{Error, WriteProgress};
use iapflash_core::flash::{self, FlashContext, Timeouts, ERASED_WORD};
use iapflash_core::memory_map::MemoryMap;
use iapflash_core::wp::{self, DisableOutcome, EnableOutcome, OptionBytes, RdpLevel};

use crate::{SimController, SimOp};

const USER_START: u32 = 0x0800_3000;
const USER_END: u32 = 0x0801_0000;

fn setup() -> (SimController, FlashContext) {
    let map = MemoryMap::stm32f0_64k();
    let ctx = FlashContext::new(map).unwrap();
    (SimController::new(map), ctx)
}

/// Controller whose flash holds a non-erased pattern everywhere
fn setup_dirty() -> (SimController, FlashContext) {
    let map = MemoryMap::stm32f0_64k();
    let ctx = FlashContext::new(map).unwrap();
    let pattern: Vec<u32> = (0..map.flash_size / 4).collect();
    (SimController::with_words(map, &pattern), ctx)
}

fn program_ops(sim: &SimController) -> usize {
    sim.ops()
        .iter()
        .filter(|op| matches!(op, SimOp::WordProgram(..)))
        .count()
}

#[test]
fn test_init_leaves_controller_locked() {
    let (mut sim, _ctx) = setup();
    flash::init(&mut sim).unwrap();
    assert!(sim.is_locked());
    assert_eq!(sim.ops(), &[SimOp::Unlock, SimOp::Lock]);
}

#[test]
fn test_erase_two_pages_at_top_of_user_area() {
    let (mut sim, ctx) = setup_dirty();

    let pages = flash::erase(&mut sim, &ctx, 0x0800_F800).unwrap();
    assert_eq!(pages, 2);
    assert_eq!(
        sim.ops(),
        &[
            SimOp::Unlock,
            SimOp::PageErase(0x0800_F800),
            SimOp::PageErase(0x0800_FC00),
            SimOp::Lock,
        ]
    );
    assert!(flash::is_erased(&mut sim, &ctx, 0x0800_F800, 0x800).unwrap());
    // Word just below the erased range untouched
    assert_ne!(sim.peek(0x0800_F7FC), Some(ERASED_WORD));
}

#[test]
fn test_erase_covers_user_area_only() {
    let (mut sim, ctx) = setup_dirty();
    let before = sim.words().to_vec();

    flash::erase(&mut sim, &ctx, USER_START).unwrap();

    let base = sim.map().flash_base;
    for (i, (&now, &was)) in sim.words().iter().zip(before.iter()).enumerate() {
        let addr = base + i as u32 * 4;
        if addr >= USER_START {
            assert_eq!(now, ERASED_WORD, "word at 0x{:08X} not erased", addr);
        } else {
            assert_eq!(now, was, "word at 0x{:08X} modified", addr);
        }
    }
    assert!(sim.is_locked());
}

#[test]
fn test_erase_at_user_end_is_empty() {
    let (mut sim, ctx) = setup();
    assert_eq!(flash::erase(&mut sim, &ctx, USER_END), Ok(0));
    assert_eq!(sim.ops(), &[SimOp::Unlock, SimOp::Lock]);
}

#[test]
fn test_erase_rejects_bad_start_without_touching_flash() {
    let (mut sim, ctx) = setup();
    assert_eq!(
        flash::erase(&mut sim, &ctx, 0x0800_3200),
        Err(Error::InvalidAlignment)
    );
    assert_eq!(
        flash::erase(&mut sim, &ctx, 0x0800_0000),
        Err(Error::OutOfBounds)
    );
    assert_eq!(
        flash::erase(&mut sim, &ctx, 0x0801_0400),
        Err(Error::OutOfBounds)
    );
    assert!(sim.ops().is_empty());
}

#[test]
fn test_erase_failure_reports_first_failing_page() {
    let (mut sim, ctx) = setup_dirty();
    sim.faults_mut().fail_page_erase = Some(0x0800_F000);

    let err = flash::erase(&mut sim, &ctx, 0x0800_E800).unwrap_err();
    match err {
        Error::EraseFailed(failure) => {
            assert_eq!(failure.page_addr, 0x0800_F000);
            assert!(failure.status.has_error());
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Earlier pages erased, later pages untouched, controller locked again
    assert!(flash::is_erased(&mut sim, &ctx, 0x0800_E800, 0x800).unwrap());
    assert_ne!(sim.peek(0x0800_F400), Some(ERASED_WORD));
    assert!(!sim.ops().contains(&SimOp::PageErase(0x0800_F400)));
    assert!(sim.is_locked());
}

#[test]
fn test_erase_of_protected_page_fails() {
    let (mut sim, ctx) = setup();
    sim.set_option_bytes(OptionBytes::ERASED.with_write_protected(1 << 15));

    let err = flash::erase(&mut sim, &ctx, 0x0800_F800).unwrap_err();
    assert!(matches!(
        err,
        Error::EraseFailed(failure) if failure.page_addr == 0x0800_F800
    ));
}

#[test]
fn test_write_two_words_and_read_back() {
    let (mut sim, ctx) = setup();
    let mut address = 0x0800_F800;

    let written =
        flash::write_verify(&mut sim, &ctx, &mut address, &[0xAAAA_AAAA, 0xBBBB_BBBB]).unwrap();
    assert_eq!(written, 2);
    assert_eq!(address, 0x0800_F808);

    let mut buf = [0u32; 2];
    flash::read_words(&mut sim, &ctx, 0x0800_F800, &mut buf).unwrap();
    assert_eq!(buf, [0xAAAA_AAAA, 0xBBBB_BBBB]);
    assert!(sim.is_locked());
}

#[test]
fn test_chunked_writes_continue_from_cursor() {
    let (mut sim, ctx) = setup();
    let image: Vec<u32> = (0..300u32).map(|i| i.wrapping_mul(0x0101_0101)).collect();
    let mut address = USER_START;

    for chunk in image.chunks(64) {
        flash::write_verify(&mut sim, &ctx, &mut address, chunk).unwrap();
    }
    assert_eq!(address, USER_START + 300 * 4);

    let mut readback = vec![0u32; image.len()];
    flash::read_words(&mut sim, &ctx, USER_START, &mut readback).unwrap();
    assert_eq!(readback, image);
}

#[test]
fn test_write_fills_user_area_up_to_the_last_word() {
    let (mut sim, ctx) = setup();
    let mut address = USER_END - 8;
    assert_eq!(
        flash::write_verify(&mut sim, &ctx, &mut address, &[1, 2]),
        Ok(2)
    );
    assert_eq!(address, USER_END);
}

#[test]
fn test_write_verify_mismatch_stops_at_failing_word() {
    let (mut sim, ctx) = setup();
    let start = 0x0800_F800;
    sim.faults_mut().stuck_erased_at = Some(start + 4);
    let words = [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444, 0x5555_5555];
    let mut address = start;

    let err = flash::write_verify(&mut sim, &ctx, &mut address, &words).unwrap_err();
    assert_eq!(
        err,
        Error::VerifyMismatch {
            progress: WriteProgress {
                words_written: 1,
                next_address: start + 4,
            },
            expected: 0x2222_2222,
            found: ERASED_WORD,
        }
    );
    assert_eq!(address, start + 4);

    // Words 2..4 never attempted
    assert_eq!(program_ops(&sim), 2);
    assert_eq!(sim.peek(start), Some(0x1111_1111));
    assert_eq!(sim.peek(start + 8), Some(ERASED_WORD));
    assert!(sim.is_locked());
}

#[test]
fn test_write_program_failure_reports_progress() {
    let (mut sim, ctx) = setup();
    let start = USER_START;
    sim.faults_mut().fail_program_at = Some(start + 12);
    let mut address = start;

    let err = flash::write_verify(&mut sim, &ctx, &mut address, &[1, 2, 3, 4, 5, 6]).unwrap_err();
    assert_eq!(
        err,
        Error::ProgramFailed(WriteProgress {
            words_written: 3,
            next_address: start + 12,
        })
    );
    assert_eq!(address, start + 12);
    assert_eq!(program_ops(&sim), 4);
    assert!(sim.is_locked());
}

#[test]
fn test_write_over_unerased_word_fails() {
    let (mut sim, ctx) = setup();
    sim.poke(USER_START, 0);
    let mut address = USER_START;

    let err = flash::write_verify(&mut sim, &ctx, &mut address, &[0x1234_5678]).unwrap_err();
    assert!(matches!(err, Error::ProgramFailed(p) if p.words_written == 0));
}

#[test]
fn test_write_crossing_user_end_is_rejected_up_front() {
    let (mut sim, ctx) = setup();
    let mut address = USER_END - 8;

    let err = flash::write_verify(&mut sim, &ctx, &mut address, &[1, 2, 3]).unwrap_err();
    assert_eq!(err, Error::OutOfBounds);
    assert_eq!(address, USER_END - 8);
    assert!(sim.ops().is_empty());
}

#[test]
fn test_write_rejects_misaligned_and_bootloader_addresses() {
    let (mut sim, ctx) = setup();

    let mut address = USER_START + 2;
    assert_eq!(
        flash::write_verify(&mut sim, &ctx, &mut address, &[1]),
        Err(Error::InvalidAlignment)
    );

    let mut address = USER_START - 4;
    assert_eq!(
        flash::write_verify(&mut sim, &ctx, &mut address, &[1]),
        Err(Error::OutOfBounds)
    );
    assert!(sim.ops().is_empty());
}

#[test]
fn test_busy_controller_times_out_and_locks() {
    let map = MemoryMap::stm32f0_64k();
    let timeouts = Timeouts {
        poll_delay_us: 10,
        page_erase_us: 1_000,
        word_program_us: 100,
        option_bytes_us: 1_000,
    };
    let ctx = FlashContext::with_timeouts(map, timeouts).unwrap();
    let mut sim = SimController::new(map);
    sim.faults_mut().stuck_busy = true;

    assert_eq!(
        flash::erase(&mut sim, &ctx, 0x0800_FC00),
        Err(Error::Timeout)
    );
    assert_eq!(sim.elapsed_us(), 1_000);
    assert!(sim.is_locked());

    let mut address = USER_START;
    assert_eq!(
        flash::write_verify(&mut sim, &ctx, &mut address, &[1]),
        Err(Error::Timeout)
    );
    assert!(sim.is_locked());
}

#[test]
fn test_unlock_failure_is_surfaced() {
    let (mut sim, ctx) = setup();
    sim.faults_mut().unlock_fails = true;

    assert_eq!(flash::init(&mut sim), Err(Error::UnlockFailed));
    assert_eq!(
        flash::erase(&mut sim, &ctx, USER_START),
        Err(Error::UnlockFailed)
    );
    assert!(!sim
        .ops()
        .iter()
        .any(|op| matches!(op, SimOp::PageErase(_))));
    assert!(sim.is_locked());
}

#[test]
fn test_status_reports_unprotected_bits() {
    let (mut sim, ctx) = setup();
    let mask = ctx.map.protected_pages_mask;

    let status = wp::protection_status(&mut sim, &ctx).unwrap();
    assert_eq!(status.bits(), mask);

    sim.set_option_bytes(OptionBytes::ERASED.with_write_protected(0x0000_0030));
    let status = wp::protection_status(&mut sim, &ctx).unwrap();
    assert_eq!(status.bits(), mask & !0x0000_0030);
    assert!(sim.is_locked());
}

#[test]
fn test_disable_when_nothing_protected_is_a_no_op() {
    let (mut sim, ctx) = setup();
    // Only the bootloader groups are protected
    sim.set_option_bytes(OptionBytes::ERASED.with_write_protected(0x0000_0007));

    assert_eq!(
        wp::protection_status(&mut sim, &ctx).unwrap().bits(),
        ctx.map.protected_pages_mask
    );
    sim.clear_ops();

    assert_eq!(
        wp::disable_protection(&mut sim, &ctx),
        Ok(DisableOutcome::AlreadyUnprotected)
    );
    assert!(!sim
        .ops()
        .iter()
        .any(|op| matches!(op, SimOp::OptionBytesErase | SimOp::OptionBytesProgram(_))));
    assert_eq!(sim.option_bytes().write_protected, 0x0000_0007);
}

#[test]
fn test_disable_preserves_foreign_configuration() {
    let (mut sim, ctx) = setup();
    let before = OptionBytes {
        write_protected: 0x0000_F00F,
        rdp: RdpLevel::Level1,
        user: 0x5A,
    };
    sim.set_option_bytes(before);

    assert_eq!(
        wp::disable_protection(&mut sim, &ctx),
        Ok(DisableOutcome::Disabled)
    );

    let after = sim.option_bytes();
    assert_eq!(after.rdp, RdpLevel::Level1);
    assert_eq!(after.user, 0x5A);
    // Bootloader groups 0..2 stay protected, managed groups cleared
    assert_eq!(after.write_protected, 0x0000_0007);
    assert_eq!(
        wp::protection_status(&mut sim, &ctx).unwrap().bits(),
        ctx.map.protected_pages_mask
    );

    let ob_ops: Vec<_> = sim
        .ops()
        .iter()
        .filter(|op| !matches!(op, SimOp::Unlock | SimOp::Lock))
        .copied()
        .collect();
    assert_eq!(
        &ob_ops[..2],
        &[
            SimOp::OptionBytesErase,
            SimOp::OptionBytesProgram(before.with_write_protected(0x0000_0007)),
        ]
    );
    assert!(sim.is_locked());
}

#[test]
fn test_disable_then_user_area_is_writable() {
    let (mut sim, ctx) = setup();
    sim.set_option_bytes(OptionBytes::ERASED.with_write_protected(0xFFFF_FFFF));

    wp::disable_protection(&mut sim, &ctx).unwrap();
    flash::erase(&mut sim, &ctx, USER_START).unwrap();
    let mut address = USER_START;
    flash::write_verify(&mut sim, &ctx, &mut address, &[0xCAFE_F00D]).unwrap();
    assert_eq!(sim.peek(USER_START), Some(0xCAFE_F00D));
}

#[test]
fn test_disable_aborts_when_option_erase_fails() {
    let (mut sim, ctx) = setup();
    let before = OptionBytes::ERASED.with_write_protected(0x0000_0008);
    sim.set_option_bytes(before);
    sim.faults_mut().fail_option_erase = true;

    assert_eq!(
        wp::disable_protection(&mut sim, &ctx),
        Err(Error::OptionByteEraseFailed)
    );
    assert!(!sim
        .ops()
        .iter()
        .any(|op| matches!(op, SimOp::OptionBytesProgram(_))));
    assert_eq!(sim.option_bytes(), before);
    assert!(sim.is_locked());
}

#[test]
fn test_disable_program_failure_leaves_option_bytes_erased() {
    let (mut sim, ctx) = setup();
    sim.set_option_bytes(OptionBytes {
        write_protected: 0x0000_0008,
        rdp: RdpLevel::Level1,
        user: 0x00,
    });
    sim.faults_mut().fail_option_program = true;

    assert_eq!(
        wp::disable_protection(&mut sim, &ctx),
        Err(Error::OptionByteProgramFailed)
    );
    assert_eq!(sim.option_bytes(), OptionBytes::ERASED);
    assert!(sim.is_locked());
}

#[test]
fn test_enable_then_disable_round_trip() {
    let (mut sim, ctx) = setup();
    let mask = ctx.map.protected_pages_mask;
    sim.set_option_bytes(OptionBytes {
        write_protected: 0x0000_0001,
        rdp: RdpLevel::Level0,
        user: 0xEF,
    });

    assert_eq!(
        wp::enable_protection(&mut sim, &ctx),
        Ok(EnableOutcome::Enabled)
    );
    assert_eq!(sim.option_bytes().write_protected, 0x0000_0001 | mask);
    assert!(wp::protection_status(&mut sim, &ctx)
        .unwrap()
        .is_fully_protected());
    assert_eq!(
        wp::enable_protection(&mut sim, &ctx),
        Ok(EnableOutcome::AlreadyProtected)
    );

    // Protected user area rejects writes
    let mut address = USER_START;
    assert!(matches!(
        flash::write_verify(&mut sim, &ctx, &mut address, &[0]),
        Err(Error::ProgramFailed(_))
    ));

    assert_eq!(
        wp::disable_protection(&mut sim, &ctx),
        Ok(DisableOutcome::Disabled)
    );
    assert_eq!(sim.option_bytes().write_protected, 0x0000_0001);
    assert_eq!(sim.option_bytes().user, 0xEF);
}

#[test]
fn test_option_byte_timeout() {
    let (mut sim, ctx) = setup();
    sim.set_option_bytes(OptionBytes::ERASED.with_write_protected(0x0000_0008));
    sim.faults_mut().stuck_busy = true;

    assert_eq!(wp::disable_protection(&mut sim, &ctx), Err(Error::Timeout));
    assert!(!sim
        .ops()
        .iter()
        .any(|op| matches!(op, SimOp::OptionBytesProgram(_))));
    assert!(sim.is_locked());
}
