//! Demonstrates the absolute positioning of a Pan-Tilt HAT (Pimoroni or Waveshare, auto-detected).
//! Watch the servos being de-energized 2 seconds after the move.

use pantilt_hat::devices::PanTiltHat;
use pantilt_hat::pause;

#[tokio::main]
async fn main() {
    let hat = PanTiltHat::run().expect("Pan-Tilt HAT is detected on /dev/i2c-1");
    println!("{}", hat);

    println!("Goto position pan right (+80), tilt 0");
    hat.pan(80.0)
        .and_then(|hat| hat.tilt(0.0))
        .expect("Servos move");

    println!("Wait 3 seconds to see the servo drive output disabled");
    pause!(3000);
    println!("{}", hat);

    hat.close().expect("Device closes");
}
