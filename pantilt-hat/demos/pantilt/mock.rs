//! Demonstrates a Pan-Tilt HAT running on a mocked I2C bus: no hardware needed.
//! The writes the board would have received are printed at the end.

use pantilt_hat::devices::{Axis, PanTiltHat};
use pantilt_hat::mocks::bus::MockI2cBus;
use pantilt_hat::pause;

#[tokio::main]
async fn main() {
    let bus = MockI2cBus::pimoroni();
    let hat = PanTiltHat::new(bus.clone()).expect("Pimoroni board is detected");

    hat.pan(-45.0).expect("Pan moves");
    hat.tilt_down(10).expect("Tilt moves");
    pause!(1000);
    hat.stop().expect("Moves stop");
    println!("{} {:?}", hat, hat.get_state(Axis::Tilt));

    pause!(2500);
    println!("{} {:?}", hat, hat.get_state(Axis::Pan));
    hat.close().expect("Device closes");

    for write in bus.get_writes() {
        println!(
            "0x{:02X} [0x{:02X}] <- {}",
            write.address, write.register, write.value
        );
    }
}
