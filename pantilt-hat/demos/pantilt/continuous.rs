//! Demonstrates the absolute positioning and the continuous moves of a Pan-Tilt HAT.

use pantilt_hat::devices::PanTiltHat;
use pantilt_hat::errors::Error;
use pantilt_hat::pause;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let hat = PanTiltHat::run()?;
    println!("Detected {} board", hat.get_backend());

    println!("Goto position pan left +50, tilt up -50");
    hat.pan(50.0)?.tilt(-50.0)?;
    println!("Wait 3 seconds to see the servo disable");
    pause!(3000);

    println!("Start continuous move (down, right): slow speed");
    hat.pan_right(5)?.tilt_down(2)?;
    println!("Wait 10 seconds while the camera turns");
    pause!(10_000);
    hat.stop()?;
    println!("Stop at {}", hat);
    pause!(3000);

    println!("Goto position pan left +50, tilt up -50");
    hat.pan(50.0)?.tilt(-50.0)?;
    println!("Start continuous move (down, right): fast speed");
    hat.pan_right(15)?.tilt_down(15)?;

    // Stops earlier on Ctrl+C.
    tokio::select! {
        _ = tokio::time::sleep(tokio::time::Duration::from_secs(5)) => {}
        _ = tokio::signal::ctrl_c() => println!("Interrupted"),
    }
    hat.stop()?;
    println!("Stop at {}", hat);
    pause!(3000);

    println!("Close the Pan-Tilt HAT");
    hat.close()?;
    Ok(())
}
